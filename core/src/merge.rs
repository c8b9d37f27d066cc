//! Cross-branch description merging.
//!
//! Each branch may carry its own description text for a package. The merged
//! [`Description`] comes from the newest branch (by release number, see
//! [`compare_branches`]) that has one; branches comparing equal keep the
//! first-seen candidate.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::types::{Description, compare_branches};

/// One description text observed for a package on a branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptionCandidate {
    pub package: String,
    pub branch: String,
    pub text: String,
}

impl DescriptionCandidate {
    pub fn new(
        package: impl Into<String>,
        branch: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            package: package.into(),
            branch: branch.into(),
            text: text.into(),
        }
    }
}

/// Merges per-branch description candidates into one row per package.
///
/// Candidates with blank text are ignored; packages without any remaining
/// candidate get no row. The result is sorted by package name.
///
/// # Examples
///
/// ```
/// use slice_index_core::{DescriptionCandidate, merge_descriptions};
///
/// let merged = merge_descriptions(vec![
///     DescriptionCandidate::new("foo", "ubuntu-20.04", "old text"),
///     DescriptionCandidate::new("foo", "ubuntu-24.04", "new text"),
/// ]);
/// assert_eq!(merged.len(), 1);
/// assert_eq!(merged[0].text, "new text");
/// ```
pub fn merge_descriptions<I>(candidates: I) -> Vec<Description>
where
    I: IntoIterator<Item = DescriptionCandidate>,
{
    let mut best: BTreeMap<String, DescriptionCandidate> = BTreeMap::new();

    for candidate in candidates {
        if candidate.text.trim().is_empty() {
            continue;
        }
        match best.get(&candidate.package) {
            Some(current)
                if compare_branches(&candidate.branch, &current.branch) != Ordering::Greater => {}
            _ => {
                best.insert(candidate.package.clone(), candidate);
            }
        }
    }

    best.into_values()
        .map(|candidate| Description {
            package: candidate.package,
            text: candidate.text,
        })
        .collect()
}
