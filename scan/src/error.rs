//! Error types for scanning and fetching.
//!
//! [`FetchError`] covers a single I/O operation (one git call, one file read,
//! one index download) and knows whether retrying it can help.
//! [`ScanError`] is what aborts a whole run.

use std::path::PathBuf;
use std::time::Duration;

use slice_index_core::AssembleError;
use thiserror::Error;

/// Failure of a single fetch operation.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Local I/O failure.
    #[error("I/O error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// The operation exceeded its time budget and was killed.
    #[error("`{command}` timed out after {}s", .timeout.as_secs())]
    Timeout { command: String, timeout: Duration },

    /// A subprocess ran but exited unsuccessfully.
    #[error("`{command}` exited with {status}: {stderr}")]
    Command {
        command: String,
        status: String,
        stderr: String,
    },

    /// The requested branch does not exist (any more).
    #[error("branch not found: {0}")]
    BranchMissing(String),

    /// A requested file or directory does not exist.
    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Network failure talking to a package archive.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Content was fetched but could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

impl FetchError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Returns `true` when retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Io { source, .. } => source.kind() != std::io::ErrorKind::NotFound,
            Self::Timeout { .. } | Self::Http(_) => true,
            Self::Command { .. }
            | Self::BranchMissing(_)
            | Self::NotFound(_)
            | Self::Decode(_) => false,
        }
    }

    /// Returns `true` when the failure invalidates the whole branch rather
    /// than one file.
    pub fn is_branch_fatal(&self) -> bool {
        matches!(self, Self::BranchMissing(_))
    }
}

/// Errors that abort an indexing run.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The repository could not be reached or listed at all.
    #[error("release repository unavailable: {0}")]
    Source(#[source] FetchError),

    /// The local clone points at a different remote.
    #[error("{} tracks {actual}, expected {expected}", .path.display())]
    RemoteMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// Configuration file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file is malformed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Configuration values are inconsistent.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The release calendar could not be parsed.
    #[error("invalid release calendar at line {line}: {message}")]
    Calendar { line: usize, message: String },

    /// The worker pool could not be created.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// The snapshot violates a structural invariant.
    #[error(transparent)]
    Assemble(#[from] AssembleError),
}

/// Convenience alias for results with [`ScanError`].
pub type Result<T> = std::result::Result<T, ScanError>;
