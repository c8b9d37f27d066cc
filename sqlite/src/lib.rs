//! SQLite persistence for slice index snapshots.
//!
//! A snapshot is written once, to a fresh file, by [`write_snapshot`] and
//! read back through [`SnapshotReader`]. The table layout is a fixed contract
//! with the read-only client:
//!
//! - **`schema`** — the `meta`, `release`, `slice` and `description` tables
//! - **`writer`** — single-transaction, deterministic snapshot writes
//! - **`convert`** — core values ↔ rows, JSON encoding of findings
//! - **`query`** — read-only lookups and statistics
//!
//! # Quick start
//!
//! ```no_run
//! use slice_index_core::{Meta, Snapshot};
//! use slice_index_sqlite::{SnapshotReader, write_snapshot};
//!
//! let snapshot = Snapshot::assemble(Meta::new("0.1.0"), vec![], vec![], vec![]).unwrap();
//! write_snapshot(&snapshot, "index.db", true).unwrap();
//!
//! let reader = SnapshotReader::open("index.db").unwrap();
//! println!("last update: {:?}", reader.meta("last_update").unwrap());
//! ```

mod convert;
mod error;
mod query;
mod schema;
mod writer;

pub use convert::{ReleaseRow, SliceRow};
pub use error::{Result, SqliteError};
pub use query::{SnapshotReader, SnapshotStats};
pub use schema::{SNAPSHOT_TABLES, generate_schema_sql};
pub use writer::{WriteReport, write_snapshot};
