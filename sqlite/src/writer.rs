//! Persisting an assembled [`Snapshot`] as a fresh SQLite file.
//!
//! The file is always created from scratch and filled in one transaction, in
//! the snapshot's own row order, so identical snapshots produce identical
//! bytes.
//!
//! # Example
//!
//! ```no_run
//! use chrono::Utc;
//! use slice_index_core::{Meta, Snapshot};
//! use slice_index_sqlite::write_snapshot;
//!
//! let snapshot = Snapshot::assemble(Meta::new("0.1.0"), vec![], vec![], vec![]).unwrap();
//! let report = write_snapshot(&snapshot, "index.db", true).unwrap();
//! println!("wrote {} slice rows", report.slices);
//! ```

use std::path::Path;
use std::time::Instant;

use rusqlite::Connection;
use slice_index_core::Snapshot;
use tracing::{debug, info};

use crate::convert;
use crate::error::{Result, SqliteError};
use crate::schema::generate_schema_sql;

/// Row counts of a written snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteReport {
    pub meta_rows: usize,
    pub releases: usize,
    pub slices: usize,
    pub descriptions: usize,
    /// Size of the database file in bytes.
    pub bytes: u64,
}

/// Writes `snapshot` to a new database at `path`.
///
/// # Errors
///
/// Returns [`SqliteError::OutputExists`] if `path` exists and `overwrite` is
/// false. Any failure leaves no partial database behind.
pub fn write_snapshot(
    snapshot: &Snapshot,
    path: impl AsRef<Path>,
    overwrite: bool,
) -> Result<WriteReport> {
    let path = path.as_ref();
    if path.exists() {
        if !overwrite {
            return Err(SqliteError::OutputExists(path.to_path_buf()));
        }
        debug!(path = %path.display(), "removing previous snapshot");
        std::fs::remove_file(path)?;
    }

    let started = Instant::now();
    let result = Connection::open(path)
        .map_err(SqliteError::from)
        .and_then(|mut conn| fill(&mut conn, snapshot));
    let mut report = match result {
        Ok(report) => report,
        Err(err) => {
            let _ = std::fs::remove_file(path);
            return Err(err);
        }
    };
    report.bytes = std::fs::metadata(path)?.len();

    info!(
        path = %path.display(),
        releases = report.releases,
        slices = report.slices,
        descriptions = report.descriptions,
        bytes = report.bytes,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "wrote snapshot database"
    );
    Ok(report)
}

/// Creates the tables and inserts every row in one transaction.
fn fill(conn: &mut Connection, snapshot: &Snapshot) -> Result<WriteReport> {
    conn.execute_batch("PRAGMA page_size = 4096; PRAGMA foreign_keys = ON;")?;

    let meta = snapshot.meta.rows()?;
    let tx = conn.transaction()?;
    tx.execute_batch(&generate_schema_sql())?;
    let report = WriteReport {
        meta_rows: convert::insert_meta(&tx, &meta)?,
        releases: convert::insert_releases(&tx, &snapshot.releases)?,
        slices: convert::insert_slices(&tx, &snapshot.definitions)?,
        descriptions: convert::insert_descriptions(&tx, &snapshot.descriptions)?,
        bytes: 0,
    };
    tx.commit()?;
    Ok(report)
}
