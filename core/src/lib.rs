//! Core data model and assembly for the chisel slice index.
//!
//! This crate defines the values an indexing run produces and the pure stages
//! that do not touch I/O:
//!
//! - [`Branch`] — a tracked release branch with its lifecycle flags.
//! - [`Definition`] — one slice definition file on one branch, keyed by
//!   `(package, branch)`, with its parsed document and [`Finding`]s.
//! - [`SliceDefinition`] / [`ContentRule`] — the structured view of a
//!   definition used by lint checks.
//! - [`Version`] — a declared package version, never empty.
//! - [`Snapshot`] — the complete, deterministically ordered run output.
//!
//! Parsing ([`parse_sdf`], [`Definition::from_bytes`]) contains failures per
//! file. Merging ([`merge_descriptions`]) picks one description per package
//! across branches. Validation ([`validate_snapshot`]) enforces key
//! uniqueness before a snapshot is persisted.
//!
//! # Example
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use slice_index_core::*;
//!
//! let def = Definition::from_bytes(
//!     "ubuntu-24.04",
//!     "slices/hello.yaml",
//!     b"package: hello\nslices:\n  bins:\n    contents:\n      /usr/bin/hello:\n",
//! );
//! assert_eq!(def.key(), ("hello", "ubuntu-24.04"));
//! assert!(def.version.is_none());
//!
//! let meta = Meta::at("0.1.0", Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap());
//! let snapshot = Snapshot::assemble(
//!     meta,
//!     vec![Branch::new("ubuntu-24.04")],
//!     vec![def],
//!     Vec::new(),
//! )
//! .unwrap();
//! assert_eq!(snapshot.package_count(), 1);
//! ```

mod merge;
mod sdf;
mod snapshot;
mod types;
mod validate;
mod version;

pub use merge::{DescriptionCandidate, merge_descriptions};
pub use sdf::{ParseError, ParsedSdf, fingerprint, package_key, parse_sdf};
pub use snapshot::{
    AssembleError, BranchFailure, META_FAILED_BRANCHES, META_LAST_UPDATE, META_SCHEMA_VERSION,
    META_TOOL_VERSION, META_WARNINGS, Meta, Snapshot,
};
pub use types::*;
pub use validate::{ValidationError, check_unique_keys, validate_snapshot};
pub use version::{Version, resolve_version};
