//! Error types for artifact operations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while compressing or verifying an artifact.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Gzip stream could not be produced or decoded.
    #[error("compression error: {0}")]
    CompressionError(String),

    /// Checksum sidecar is malformed or does not match the artifact.
    #[error("invalid checksum: {0}")]
    InvalidChecksum(String),

    /// The output exists and overwriting was not requested.
    #[error("{} already exists", .0.display())]
    OutputExists(PathBuf),
}

/// Convenience alias for results with [`ArtifactError`].
pub type Result<T> = std::result::Result<T, ArtifactError>;
