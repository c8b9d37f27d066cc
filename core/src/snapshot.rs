//! Snapshot assembly.
//!
//! A [`Snapshot`] is the complete result of one indexing run. It is assembled
//! once, after every worker has finished, from owned per-branch results:
//! rows are sorted here rather than in arrival order, so two runs over the
//! same input produce the same snapshot apart from [`Meta::last_update`].

use std::cmp::Ordering;
use std::collections::BTreeSet;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Branch, Definition, Description, SNAPSHOT_SCHEMA_VERSION, compare_branches};
use crate::validate::{ValidationError, validate_snapshot};

/// Meta key holding the build timestamp.
pub const META_LAST_UPDATE: &str = "last_update";
/// Meta key holding the snapshot layout version.
pub const META_SCHEMA_VERSION: &str = "schema_version";
/// Meta key holding the indexer version.
pub const META_TOOL_VERSION: &str = "tool_version";
/// Meta key holding the JSON list of failed branches.
pub const META_FAILED_BRANCHES: &str = "failed_branches";
/// Meta key holding the JSON list of run-level warnings.
pub const META_WARNINGS: &str = "warnings";

/// Errors that abort snapshot assembly.
#[derive(Debug, Error)]
pub enum AssembleError {
    /// One or more structural invariants do not hold.
    #[error("snapshot invariants violated: {}", join_errors(.0))]
    Invalid(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A branch that was skipped after its listing failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchFailure {
    pub branch: String,
    pub error: String,
}

impl BranchFailure {
    pub fn new(branch: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self {
            branch: branch.into(),
            error: error.to_string(),
        }
    }
}

/// Run-level metadata written alongside the rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meta {
    /// Build time, truncated to whole seconds.
    pub last_update: DateTime<Utc>,
    pub schema_version: String,
    pub tool_version: String,
    pub failed_branches: Vec<BranchFailure>,
    pub warnings: Vec<String>,
}

impl Meta {
    /// Creates meta stamped with the current time.
    pub fn new(tool_version: impl Into<String>) -> Self {
        Self::at(tool_version, Utc::now())
    }

    /// Creates meta stamped with a fixed time.
    pub fn at(tool_version: impl Into<String>, last_update: DateTime<Utc>) -> Self {
        Self {
            last_update: last_update.trunc_subsecs(0),
            schema_version: SNAPSHOT_SCHEMA_VERSION.to_string(),
            tool_version: tool_version.into(),
            failed_branches: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// RFC 3339 rendering of [`Meta::last_update`], e.g. `2024-05-01T12:00:00Z`.
    pub fn last_update_string(&self) -> String {
        self.last_update.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// Returns the `(key, value)` rows, sorted by key.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::{TimeZone, Utc};
    /// use slice_index_core::Meta;
    ///
    /// let meta = Meta::at("0.1.0", Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
    /// let rows = meta.rows().unwrap();
    /// assert_eq!(rows[0], ("failed_branches".to_string(), "[]".to_string()));
    /// assert_eq!(rows[1].1, "2024-05-01T12:00:00Z");
    /// ```
    pub fn rows(&self) -> Result<Vec<(String, String)>, serde_json::Error> {
        let mut rows = vec![
            (META_LAST_UPDATE.to_string(), self.last_update_string()),
            (META_SCHEMA_VERSION.to_string(), self.schema_version.clone()),
            (META_TOOL_VERSION.to_string(), self.tool_version.clone()),
            (
                META_FAILED_BRANCHES.to_string(),
                serde_json::to_string(&self.failed_branches)?,
            ),
            (META_WARNINGS.to_string(), serde_json::to_string(&self.warnings)?),
        ];
        rows.sort();
        Ok(rows)
    }
}

/// The complete, ordered output of one indexing run.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub meta: Meta,
    /// Releases ordered by branch.
    pub releases: Vec<Branch>,
    /// Definitions ordered by package, then branch.
    pub definitions: Vec<Definition>,
    /// Descriptions ordered by package.
    pub descriptions: Vec<Description>,
}

impl Snapshot {
    /// Assembles and validates a snapshot from unordered inputs.
    ///
    /// Descriptions for packages without any definition are dropped. Meta
    /// warnings are sorted and deduplicated; failed branches are ordered by
    /// branch.
    ///
    /// # Errors
    ///
    /// Returns [`AssembleError::Invalid`] when two definitions share a
    /// `(package, branch)` key or another invariant fails. This is fatal for
    /// the run; nothing is silently dropped.
    pub fn assemble(
        mut meta: Meta,
        mut releases: Vec<Branch>,
        mut definitions: Vec<Definition>,
        descriptions: Vec<Description>,
    ) -> Result<Self, AssembleError> {
        let errors = validate_snapshot(&releases, &definitions);
        if !errors.is_empty() {
            return Err(AssembleError::Invalid(errors));
        }

        releases.sort_by(|a, b| compare_branches(&a.name, &b.name));
        definitions.sort_by(compare_definitions);

        let packages: BTreeSet<&str> = definitions.iter().map(|d| d.package.as_str()).collect();
        let mut descriptions: Vec<Description> = descriptions
            .into_iter()
            .filter(|d| packages.contains(d.package.as_str()))
            .collect();
        descriptions.sort_by(|a, b| a.package.cmp(&b.package));
        descriptions.dedup_by(|a, b| a.package == b.package);

        meta.failed_branches
            .sort_by(|a, b| compare_branches(&a.branch, &b.branch));
        meta.warnings.sort();
        meta.warnings.dedup();

        Ok(Self {
            meta,
            releases,
            definitions,
            descriptions,
        })
    }

    /// Number of distinct packages with at least one definition.
    pub fn package_count(&self) -> usize {
        let mut count = 0;
        let mut last: Option<&str> = None;
        for def in &self.definitions {
            if last != Some(def.package.as_str()) {
                count += 1;
                last = Some(def.package.as_str());
            }
        }
        count
    }

    /// Looks up the definition for a `(package, branch)` key.
    pub fn find(&self, package: &str, branch: &str) -> Option<&Definition> {
        self.definitions
            .iter()
            .find(|d| d.package == package && d.branch == branch)
    }

    /// Total number of notes and warnings across all definitions.
    pub fn finding_counts(&self) -> (usize, usize) {
        self.definitions.iter().fold((0, 0), |(notes, warnings), d| {
            (notes + d.notes().count(), warnings + d.warnings().count())
        })
    }
}

fn compare_definitions(a: &Definition, b: &Definition) -> Ordering {
    a.package
        .cmp(&b.package)
        .then_with(|| compare_branches(&a.branch, &b.branch))
}
