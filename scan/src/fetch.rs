//! Acquisition of the release repository clone.

use std::path::Path;
use std::time::{Duration, Instant};

use tracing::info;

use crate::error::{FetchError, Result, ScanError};
use crate::git::run_git_text;
use crate::retry::RetryConfig;

/// What [`sync_repository`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Cloned,
    Fetched,
}

/// Makes `path` an up-to-date clone of `url` with every branch available as
/// a remote-tracking ref.
///
/// Clones when `path` does not exist. Otherwise checks that `path` is a git
/// repository whose `origin` is `url` and fetches with pruning.
///
/// # Errors
///
/// Returns [`ScanError::RemoteMismatch`] when the existing clone tracks a
/// different URL and [`ScanError::Source`] when git fails after retries.
pub fn sync_repository(
    url: &str,
    path: &Path,
    timeout: Duration,
    retry: &RetryConfig,
) -> Result<SyncAction> {
    let started = Instant::now();

    let action = if path.exists() {
        let actual = retry
            .run("git remote get-url", || {
                run_git_text(Some(path), &["remote", "get-url", "origin"], timeout)
            })
            .map_err(ScanError::Source)?;
        if !same_remote(&actual, url) {
            return Err(ScanError::RemoteMismatch {
                path: path.to_path_buf(),
                expected: url.to_string(),
                actual,
            });
        }
        retry
            .run("git fetch", || {
                run_git_text(Some(path), &["fetch", "--all", "--prune"], timeout)
            })
            .map_err(ScanError::Source)?;
        SyncAction::Fetched
    } else {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let target = path.to_string_lossy();
        retry
            .run("git clone", || {
                let result = run_git_text(
                    None,
                    &["clone", "--depth=1", "--no-single-branch", "--no-checkout", url, &target],
                    timeout,
                );
                // A failed attempt may leave a partial directory behind.
                if result.is_err() && path.exists() {
                    std::fs::remove_dir_all(path)
                        .map_err(|e| FetchError::io(format!("cleaning {}", path.display()), e))?;
                }
                result
            })
            .map_err(ScanError::Source)?;
        SyncAction::Cloned
    };

    info!(
        url,
        path = %path.display(),
        action = ?action,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "release repository ready"
    );
    Ok(action)
}

/// Compares remote URLs ignoring a trailing slash or `.git` suffix.
fn same_remote(a: &str, b: &str) -> bool {
    fn normalize(url: &str) -> &str {
        let url = url.trim().trim_end_matches('/');
        url.strip_suffix(".git").unwrap_or(url)
    }
    normalize(a) == normalize(b)
}
