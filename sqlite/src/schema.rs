//! SQL schema of the snapshot database.
//!
//! The table and column names are a contract with the read-only client and
//! never change between runs:
//!
//! - `meta(key, value)`: run metadata, one row per key
//! - `release(branch, lts, supported, devel)`: one row per indexed branch
//! - `slice(package, branch, definition, raw_definition, notes, warnings,
//!   version, component, repo, section, fingerprint)`: one row per
//!   definition file, unique on `(package, branch)`
//! - `description(package, description)`: one row per described package
//!
//! `definition` is JSON or NULL (parse failure). `notes` and `warnings` are
//! always JSON arrays of `{"note"|"warning": code}` objects, never NULL.
//! `version` is NULL when no version is declared, never empty.

/// Tables every snapshot contains, in creation order.
pub const SNAPSHOT_TABLES: [&str; 4] = ["meta", "release", "slice", "description"];

/// Generates the `CREATE TABLE` and `CREATE INDEX` statements.
pub fn generate_schema_sql() -> String {
    r#"
CREATE TABLE meta (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
);

CREATE TABLE release (
    branch TEXT PRIMARY KEY NOT NULL,
    lts INTEGER NOT NULL DEFAULT 0,
    supported INTEGER NOT NULL DEFAULT 0,
    devel INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE slice (
    package TEXT NOT NULL,
    branch TEXT NOT NULL,
    definition TEXT,
    raw_definition TEXT NOT NULL,
    notes TEXT NOT NULL DEFAULT '[]',
    warnings TEXT NOT NULL DEFAULT '[]',
    version TEXT CHECK (version IS NULL OR version <> ''),
    component TEXT,
    repo TEXT,
    section TEXT,
    fingerprint TEXT NOT NULL,
    UNIQUE (package, branch),
    FOREIGN KEY (branch) REFERENCES release(branch)
);

CREATE TABLE description (
    package TEXT PRIMARY KEY NOT NULL,
    description TEXT NOT NULL
);

CREATE INDEX idx_slice_branch ON slice(branch);
"#
    .to_string()
}
