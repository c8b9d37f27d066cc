//! Retry with exponential backoff for transient fetch failures.

use std::time::Duration;

use tracing::warn;

use crate::error::FetchError;

/// Retry behavior for I/O operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial one).
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryConfig {
    /// A configuration that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (1-based), doubling each time.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use slice_index_scan::RetryConfig;
    ///
    /// let retry = RetryConfig::default();
    /// assert_eq!(retry.delay_for(1), Duration::from_millis(200));
    /// assert_eq!(retry.delay_for(2), Duration::from_millis(400));
    /// assert_eq!(retry.delay_for(10), Duration::from_secs(5));
    /// ```
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Runs `op`, retrying transient failures.
    ///
    /// Non-transient errors are returned immediately; the last transient
    /// error is returned once attempts are exhausted.
    pub fn run<T, F>(&self, label: &str, mut op: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Result<T, FetchError>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        operation = label,
                        attempt,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient failure, retrying"
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
