//! Conversion between snapshot values and SQLite rows.
//!
//! Writing goes one way, from core types to rows. Reading returns plain row
//! structs ([`SliceRow`], [`ReleaseRow`]) that mirror the columns, with the
//! JSON columns decoded.

use rusqlite::{Row, Transaction, params};
use serde::Serialize;
use slice_index_core::{Branch, Definition, Description, Finding};

use crate::error::{Result, SqliteError};

/// Encodes findings as the JSON array stored in `notes`/`warnings`.
pub(crate) fn findings_to_json<'a>(findings: impl Iterator<Item = &'a Finding>) -> Result<String> {
    let findings: Vec<&Finding> = findings.collect();
    Ok(serde_json::to_string(&findings)?)
}

/// Decodes a `notes`/`warnings` column.
pub(crate) fn findings_from_json(column: &str, text: &str) -> Result<Vec<Finding>> {
    serde_json::from_str(text)
        .map_err(|e| SqliteError::ConversionError(format!("invalid {column} column: {e}")))
}

pub(crate) fn insert_meta(tx: &Transaction<'_>, rows: &[(String, String)]) -> Result<usize> {
    let mut stmt = tx.prepare("INSERT INTO meta (key, value) VALUES (?1, ?2)")?;
    for (key, value) in rows {
        stmt.execute(params![key, value])?;
    }
    Ok(rows.len())
}

pub(crate) fn insert_releases(tx: &Transaction<'_>, releases: &[Branch]) -> Result<usize> {
    let mut stmt = tx.prepare(
        "INSERT INTO release (branch, lts, supported, devel) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for release in releases {
        stmt.execute(params![
            release.name,
            release.flags.lts,
            release.flags.supported,
            release.flags.devel,
        ])?;
    }
    Ok(releases.len())
}

pub(crate) fn insert_slices(tx: &Transaction<'_>, definitions: &[Definition]) -> Result<usize> {
    let mut stmt = tx.prepare(
        "INSERT INTO slice (package, branch, definition, raw_definition, notes, warnings, \
         version, component, repo, section, fingerprint) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    )?;
    for def in definitions {
        let document = def
            .document
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        stmt.execute(params![
            def.package,
            def.branch,
            document,
            def.raw,
            findings_to_json(def.notes())?,
            findings_to_json(def.warnings())?,
            def.version.as_ref().map(|v| v.as_str()),
            def.archive.component,
            def.archive.repo,
            def.archive.section,
            def.fingerprint,
        ])?;
    }
    Ok(definitions.len())
}

pub(crate) fn insert_descriptions(
    tx: &Transaction<'_>,
    descriptions: &[Description],
) -> Result<usize> {
    let mut stmt = tx.prepare("INSERT INTO description (package, description) VALUES (?1, ?2)")?;
    for description in descriptions {
        stmt.execute(params![description.package, description.text])?;
    }
    Ok(descriptions.len())
}

/// One row of the `release` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseRow {
    pub branch: String,
    pub lts: bool,
    pub supported: bool,
    pub devel: bool,
}

impl ReleaseRow {
    pub(crate) const COLUMNS: &'static str = "branch, lts, supported, devel";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            branch: row.get(0)?,
            lts: row.get(1)?,
            supported: row.get(2)?,
            devel: row.get(3)?,
        })
    }
}

/// One row of the `slice` table with its JSON columns decoded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SliceRow {
    pub package: String,
    pub branch: String,
    /// Parsed document; `None` when the file failed to parse.
    pub definition: Option<serde_json::Value>,
    pub raw_definition: String,
    pub notes: Vec<Finding>,
    pub warnings: Vec<Finding>,
    pub version: Option<String>,
    pub component: Option<String>,
    pub repo: Option<String>,
    pub section: Option<String>,
    pub fingerprint: String,
}

impl SliceRow {
    pub(crate) const COLUMNS: &'static str = "package, branch, definition, raw_definition, \
        notes, warnings, version, component, repo, section, fingerprint";

    pub(crate) fn from_row(row: &Row<'_>) -> Result<Self> {
        let definition: Option<String> = row.get(2)?;
        let notes: String = row.get(4)?;
        let warnings: String = row.get(5)?;
        Ok(Self {
            package: row.get(0)?,
            branch: row.get(1)?,
            definition: definition
                .map(|text| {
                    serde_json::from_str(&text).map_err(|e| {
                        SqliteError::ConversionError(format!("invalid definition column: {e}"))
                    })
                })
                .transpose()?,
            raw_definition: row.get(3)?,
            notes: findings_from_json("notes", &notes)?,
            warnings: findings_from_json("warnings", &warnings)?,
            version: row.get(6)?,
            component: row.get(7)?,
            repo: row.get(8)?,
            section: row.get(9)?,
            fingerprint: row.get(10)?,
        })
    }

    /// Label a client shows for the cell: the version, else the fingerprint.
    pub fn label(&self) -> &str {
        self.version.as_deref().unwrap_or(&self.fingerprint)
    }
}
