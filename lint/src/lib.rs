//! Lint engine for slice definition files.
//!
//! Checks are independent, pure functions of a parsed definition and its raw
//! text. They are kept in an ordered registry ([`LintEngine`]); the
//! registration order is the order findings are serialized in. Adding a check
//! means implementing [`Check`] and registering it, nothing else.
//!
//! A check that returns an error or panics never takes the run down: the
//! engine records a `check-failed` warning for that definition and carries on
//! with the remaining checks.
//!
//! # Example
//!
//! ```
//! use slice_index_core::Definition;
//! use slice_index_lint::{LintConfig, LintEngine};
//!
//! let engine = LintEngine::with_defaults(&LintConfig::default());
//! let def = Definition::from_bytes(
//!     "ubuntu-24.04",
//!     "slices/hello.yaml",
//!     b"package: hello\nslices:\n  bins:\n    contents:\n      /usr/bin/hello:\n",
//! );
//! let findings = engine.lint(&def);
//! assert!(findings.iter().any(|f| f.code == "missing-copyright"));
//! ```

pub mod checks;
mod engine;

pub use engine::{CHECK_FAILED_CODE, LintEngine};

use serde::{Deserialize, Serialize};
use slice_index_core::{Finding, Severity, SliceDefinition};
use thiserror::Error;

/// Error returned by a check that could not complete.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("invalid glob pattern: {0}")]
    Glob(#[from] globset::Error),
    #[error("invalid pattern: {0}")]
    Regex(#[from] regex::Error),
    #[error("{0}")]
    Other(String),
}

/// Convenience alias for check results.
pub type Result<T> = std::result::Result<T, CheckError>;

/// Thresholds for the heuristic checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LintConfig {
    /// Comment blocks longer than this many lines are flagged.
    pub large_comment_lines: usize,
    /// Runs of blank lines longer than this are flagged.
    pub max_blank_lines: usize,
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            large_comment_lines: 10,
            max_blank_lines: 2,
        }
    }
}

/// What a check sees: the structured definition and the verbatim text.
#[derive(Debug, Clone, Copy)]
pub struct CheckInput<'a> {
    pub definition: &'a SliceDefinition,
    pub raw: &'a str,
}

/// One lint rule.
///
/// Implementations must be pure: the same input always yields the same
/// findings, and no state is shared between calls.
pub trait Check: Send + Sync {
    /// Stable finding code, e.g. `double-glob`.
    fn code(&self) -> &'static str;

    /// Severity of every finding this check emits.
    fn severity(&self) -> Severity;

    /// Runs the check against one definition.
    fn run(&self, input: &CheckInput<'_>) -> Result<Vec<Finding>>;

    /// A bare finding carrying this check's code and severity.
    fn finding(&self) -> Finding {
        Finding::new(self.severity(), self.code())
    }
}

/// Returns the 1-based number of the first line containing `needle`.
pub(crate) fn line_containing(raw: &str, needle: &str) -> Option<usize> {
    raw.lines()
        .position(|line| line.contains(needle))
        .map(|idx| idx + 1)
}

/// Returns the 1-based number of the first line declaring mapping key `key`.
pub(crate) fn key_line(raw: &str, key: &str) -> Option<usize> {
    raw.lines()
        .position(|line| {
            let line = line.trim_start();
            line.strip_prefix(key)
                .is_some_and(|rest| rest.trim_start().starts_with(':'))
        })
        .map(|idx| idx + 1)
}
