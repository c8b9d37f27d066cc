//! Snapshot invariant validation.
//!
//! Checks the structural invariants an assembled snapshot must hold before it
//! is persisted: every `(package, branch)` key is unique, every definition
//! belongs to a listed release, and no key component is empty. Violations are
//! build-fatal; they are reported to the operator, never resolved silently.
//!
//! # Examples
//!
//! ```
//! use slice_index_core::*;
//!
//! let defs = vec![
//!     Definition::from_bytes("ubuntu-24.04", "slices/foo.yaml", b"package: foo\n"),
//!     Definition::from_bytes("ubuntu-24.04", "slices/foo.yml", b"package: foo\n"),
//! ];
//! let errors = check_unique_keys(&defs);
//! assert!(matches!(errors[0], ValidationError::DuplicateDefinition { .. }));
//! ```

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::types::{Branch, Definition};

/// Snapshot validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A definition has an empty package key.
    #[error("definition at {path} on {branch} has an empty package key")]
    EmptyPackageKey { branch: String, path: String },
    /// A release has an empty branch name.
    #[error("release branch name cannot be empty")]
    EmptyBranchName,
    /// Two definitions resolve to the same `(package, branch)` key.
    #[error("duplicate definition for {package} on {branch}: {first} and {second}")]
    DuplicateDefinition {
        package: String,
        branch: String,
        first: String,
        second: String,
    },
    /// The same branch is listed twice as a release.
    #[error("duplicate release: {0}")]
    DuplicateRelease(String),
    /// A definition belongs to a branch missing from the release list.
    #[error("definition for {package} references unlisted branch {branch}")]
    OrphanDefinition { package: String, branch: String },
}

/// Checks that no two definitions share a `(package, branch)` key.
///
/// Every collision is reported, naming both source paths.
pub fn check_unique_keys(definitions: &[Definition]) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut seen: HashMap<(&str, &str), &str> = HashMap::new();

    for def in definitions {
        if def.package.trim().is_empty() {
            errors.push(ValidationError::EmptyPackageKey {
                branch: def.branch.clone(),
                path: def.path.clone(),
            });
            continue;
        }
        if let Some(first) = seen.insert(def.key(), def.path.as_str()) {
            errors.push(ValidationError::DuplicateDefinition {
                package: def.package.clone(),
                branch: def.branch.clone(),
                first: first.to_string(),
                second: def.path.clone(),
            });
        }
    }

    errors
}

/// Validates releases and definitions together.
///
/// Returns an empty vector when the snapshot may be persisted.
pub fn validate_snapshot(releases: &[Branch], definitions: &[Definition]) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let mut branches: HashSet<&str> = HashSet::new();
    for release in releases {
        let name = release.name.trim();
        if name.is_empty() {
            errors.push(ValidationError::EmptyBranchName);
            continue;
        }
        if !branches.insert(release.name.as_str()) {
            errors.push(ValidationError::DuplicateRelease(release.name.clone()));
        }
    }

    errors.extend(check_unique_keys(definitions));

    for def in definitions {
        if !branches.contains(def.branch.as_str()) {
            errors.push(ValidationError::OrphanDefinition {
                package: def.package.clone(),
                branch: def.branch.clone(),
            });
        }
    }

    errors
}
