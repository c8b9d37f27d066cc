//! Error types for snapshot database operations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while writing or reading a snapshot database.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// SQLite database operation failure.
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// A value could not be encoded for, or decoded from, a column.
    #[error("conversion error: {0}")]
    ConversionError(String),

    /// The output file exists and overwriting was not requested.
    #[error("{} already exists (use --force to overwrite)", .0.display())]
    OutputExists(PathBuf),

    /// Filesystem failure around the database file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The database lacks the snapshot tables.
    #[error("not a slice index snapshot: missing table {0}")]
    NotASnapshot(String),
}

impl From<serde_json::Error> for SqliteError {
    fn from(err: serde_json::Error) -> Self {
        Self::ConversionError(err.to_string())
    }
}

/// Convenience alias for results with [`SqliteError`].
pub type Result<T> = std::result::Result<T, SqliteError>;
