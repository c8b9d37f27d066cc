//! Branch enumeration.

use chrono::NaiveDate;
use slice_index_core::{Branch, compare_branches};
use tracing::{info, warn};

use crate::calendar::ReleaseCalendar;
use crate::error::{Result, ScanError};
use crate::repository::ReleaseRepository;
use crate::retry::RetryConfig;

/// Branches selected for indexing, plus snapshot-level warnings.
#[derive(Debug, Clone, Default)]
pub struct BranchList {
    /// Release branches, oldest first.
    pub branches: Vec<Branch>,
    pub warnings: Vec<String>,
}

/// Lists release branches and classifies them with the calendar.
///
/// Only names starting with `prefix` are kept. A branch missing from the
/// calendar is still indexed, with every flag false and a warning.
///
/// # Errors
///
/// Returns [`ScanError::Source`] when the repository cannot be listed at all;
/// this aborts the run.
pub fn enumerate_branches(
    repo: &dyn ReleaseRepository,
    calendar: &ReleaseCalendar,
    prefix: &str,
    today: NaiveDate,
    retry: &RetryConfig,
) -> Result<BranchList> {
    let names = retry
        .run("list branches", || repo.branch_names())
        .map_err(ScanError::Source)?;

    let mut selected: Vec<String> = names
        .into_iter()
        .filter(|name| name.starts_with(prefix) && name.len() > prefix.len())
        .collect();
    selected.sort_by(|a, b| compare_branches(a, b));
    selected.dedup();

    let mut list = BranchList::default();
    for name in selected {
        match calendar.lookup(&name, today) {
            Some((series, flags)) => {
                list.branches
                    .push(Branch::new(name).with_codename(series).with_flags(flags));
            }
            None => {
                warn!(branch = %name, "branch not in release calendar, flags default to false");
                list.warnings
                    .push(format!("{name}: no release metadata, flags default to false"));
                list.branches.push(Branch::new(name));
            }
        }
    }

    info!(
        source = %repo.describe(),
        branches = list.branches.len(),
        unresolved = list.warnings.len(),
        "enumerated release branches"
    );
    Ok(list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;

    struct Names(Vec<&'static str>);

    impl ReleaseRepository for Names {
        fn describe(&self) -> String {
            "names".into()
        }

        fn branch_names(&self) -> std::result::Result<Vec<String>, FetchError> {
            Ok(self.0.iter().map(|s| s.to_string()).collect())
        }

        fn list_definitions(&self, _branch: &str) -> std::result::Result<Vec<String>, FetchError> {
            Ok(Vec::new())
        }

        fn read_definition(
            &self,
            _branch: &str,
            _path: &str,
        ) -> std::result::Result<Vec<u8>, FetchError> {
            Ok(Vec::new())
        }
    }

    struct Unreachable;

    impl ReleaseRepository for Unreachable {
        fn describe(&self) -> String {
            "unreachable".into()
        }

        fn branch_names(&self) -> std::result::Result<Vec<String>, FetchError> {
            Err(FetchError::NotFound("/nowhere".into()))
        }

        fn list_definitions(&self, _branch: &str) -> std::result::Result<Vec<String>, FetchError> {
            unreachable!()
        }

        fn read_definition(
            &self,
            _branch: &str,
            _path: &str,
        ) -> std::result::Result<Vec<u8>, FetchError> {
            unreachable!()
        }
    }

    const CSV: &str = "\
version,codename,series,created,release,eol,eol-server
22.04 LTS,Jammy Jellyfish,jammy,2021-10-14,2022-04-21,2027-06-01,2027-06-01
24.04 LTS,Noble Numbat,noble,2023-10-26,2024-04-25,2029-05-31,2029-05-31
";

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
    }

    #[test]
    fn test_filters_and_orders_numerically() {
        let repo = Names(vec!["main", "ubuntu-24.04", "ubuntu-22.04", "ubuntu-", "feature-x"]);
        let calendar = ReleaseCalendar::parse(CSV).unwrap();
        let list =
            enumerate_branches(&repo, &calendar, "ubuntu-", today(), &RetryConfig::none()).unwrap();

        let names: Vec<_> = list.branches.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["ubuntu-22.04", "ubuntu-24.04"]);
        assert_eq!(list.branches[1].codename.as_deref(), Some("noble"));
        assert!(list.branches[1].flags.lts && list.branches[1].flags.supported);
        assert!(list.warnings.is_empty());
    }

    #[test]
    fn test_unknown_branch_gets_default_flags_and_warning() {
        let repo = Names(vec!["ubuntu-24.04", "ubuntu-99.10"]);
        let calendar = ReleaseCalendar::parse(CSV).unwrap();
        let list =
            enumerate_branches(&repo, &calendar, "ubuntu-", today(), &RetryConfig::none()).unwrap();

        let unknown = &list.branches[1];
        assert_eq!(unknown.name, "ubuntu-99.10");
        assert!(!unknown.flags.lts && !unknown.flags.supported && !unknown.flags.devel);
        assert_eq!(unknown.codename, None);
        assert_eq!(list.warnings.len(), 1);
        assert!(list.warnings[0].starts_with("ubuntu-99.10"));
    }

    #[test]
    fn test_unlistable_repository_is_fatal() {
        let err = enumerate_branches(
            &Unreachable,
            &ReleaseCalendar::empty(),
            "ubuntu-",
            today(),
            &RetryConfig::none(),
        )
        .unwrap_err();
        assert!(matches!(err, ScanError::Source(_)));
    }
}
