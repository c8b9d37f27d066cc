//! Read-only access to a snapshot database.
//!
//! [`SnapshotReader`] issues the same kind of filtered, ordered scans the
//! client performs and is what `slice-index info` and the tests use to check
//! the persisted contract.
//!
//! # Example
//!
//! ```no_run
//! use slice_index_sqlite::SnapshotReader;
//!
//! let reader = SnapshotReader::open("index.db").unwrap();
//! for row in reader.package_rows("libc6").unwrap() {
//!     println!("{}: {}", row.branch, row.label());
//! }
//! ```

use std::path::Path;

use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use serde::Serialize;
use slice_index_core::compare_branches;

use crate::convert::{ReleaseRow, SliceRow};
use crate::error::{Result, SqliteError};
use crate::schema::SNAPSHOT_TABLES;

/// Aggregate numbers over one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SnapshotStats {
    /// Rows in `slice`.
    pub rows: usize,
    pub releases: usize,
    /// Distinct packages in `slice`.
    pub packages: usize,
    pub descriptions: usize,
    /// Rows whose definition failed to parse.
    pub unparsed: usize,
    /// Rows with at least one warning.
    pub with_warnings: usize,
    /// Rows with a declared version.
    pub versioned: usize,
}

/// Read-only view of a snapshot database.
pub struct SnapshotReader {
    conn: Connection,
}

impl SnapshotReader {
    /// Opens a snapshot file read-only.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::NotASnapshot`] if a contract table is missing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Self::from_connection(conn)
    }

    /// Wraps an existing connection, checking the contract tables exist.
    pub fn from_connection(conn: Connection) -> Result<Self> {
        for table in SNAPSHOT_TABLES {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                [table],
                |row| row.get(0),
            )?;
            if count == 0 {
                return Err(SqliteError::NotASnapshot(table.to_string()));
            }
        }
        Ok(Self { conn })
    }

    /// Looks up one meta value.
    pub fn meta(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row("SELECT value FROM meta WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?)
    }

    /// All meta rows, ordered by key.
    pub fn meta_rows(&self) -> Result<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare("SELECT key, value FROM meta ORDER BY key")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    /// Releases, oldest first.
    pub fn releases(&self) -> Result<Vec<ReleaseRow>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM release", ReleaseRow::COLUMNS))?;
        let mut releases = stmt
            .query_map([], ReleaseRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        releases.sort_by(|a, b| compare_branches(&a.branch, &b.branch));
        Ok(releases)
    }

    /// Distinct package names, sorted.
    pub fn packages(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT package FROM slice ORDER BY package")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    /// Every row of one package, oldest branch first.
    pub fn package_rows(&self, package: &str) -> Result<Vec<SliceRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM slice WHERE package = ?1",
            SliceRow::COLUMNS
        ))?;
        let mut rows = self.collect_slices(&mut stmt, params![package])?;
        rows.sort_by(|a, b| compare_branches(&a.branch, &b.branch));
        Ok(rows)
    }

    /// The row for one `(package, branch)` key.
    pub fn slice(&self, package: &str, branch: &str) -> Result<Option<SliceRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM slice WHERE package = ?1 AND branch = ?2",
            SliceRow::COLUMNS
        ))?;
        Ok(self
            .collect_slices(&mut stmt, params![package, branch])?
            .into_iter()
            .next())
    }

    /// Description text of a package.
    pub fn description(&self, package: &str) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row(
                "SELECT description FROM description WHERE package = ?1",
                [package],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// Row counts over the whole snapshot.
    pub fn stats(&self) -> Result<SnapshotStats> {
        let count = |sql: &str| -> Result<usize> {
            let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as usize)
        };
        Ok(SnapshotStats {
            rows: count("SELECT COUNT(*) FROM slice")?,
            releases: count("SELECT COUNT(*) FROM release")?,
            packages: count("SELECT COUNT(DISTINCT package) FROM slice")?,
            descriptions: count("SELECT COUNT(*) FROM description")?,
            unparsed: count("SELECT COUNT(*) FROM slice WHERE definition IS NULL")?,
            with_warnings: count("SELECT COUNT(*) FROM slice WHERE warnings <> '[]'")?,
            versioned: count("SELECT COUNT(*) FROM slice WHERE version IS NOT NULL")?,
        })
    }

    fn collect_slices(
        &self,
        stmt: &mut rusqlite::Statement<'_>,
        params: impl rusqlite::Params,
    ) -> Result<Vec<SliceRow>> {
        let mut rows = stmt.query(params)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(SliceRow::from_row(row)?);
        }
        Ok(out)
    }
}
