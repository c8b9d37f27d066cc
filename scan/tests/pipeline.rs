//! End-to-end pipeline runs over directory fixtures and fake repositories.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use slice_index_core::{PARSE_ERROR_CODE, Snapshot};
use slice_index_lint::LintEngine;
use slice_index_scan::{
    DirectoryRepository, FetchError, MirrorSource, PackageIndexSettings, Pipeline,
    ReleaseCalendar, ReleaseRepository, RetryConfig, ScanError,
};

const CALENDAR: &str = "\
version,codename,series,created,release,eol,eol-server
20.04 LTS,Focal Fossa,focal,2019-10-17,2020-04-23,2025-05-29,2025-05-29
22.04 LTS,Jammy Jellyfish,jammy,2021-10-14,2022-04-21,2027-06-01,2027-06-01
24.04 LTS,Noble Numbat,noble,2023-10-26,2024-04-25,2029-05-31,2029-05-31
";

fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
}

fn quick_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
    }
}

fn sdf(package: &str) -> String {
    format!(
        "package: {package}\n\nessential:\n  - {package}_copyright\n\nslices:\n  copyright:\n    contents:\n      /usr/share/doc/{package}/copyright:\n\n  bins:\n    contents:\n      /usr/bin/{package}:\n"
    )
}

fn write_sdf(root: &Path, branch: &str, file: &str, text: &str) {
    let dir = root.join(branch).join("slices");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(file), text).unwrap();
}

fn pipeline(repo: impl ReleaseRepository + 'static) -> Pipeline {
    Pipeline::new(Box::new(repo), LintEngine::default())
        .with_calendar(ReleaseCalendar::parse(CALENDAR).unwrap())
        .with_retry(quick_retry())
        .at(fixed_time())
}

#[test]
fn test_parse_failure_is_contained() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..9 {
        let package = format!("pkg{i}");
        write_sdf(dir.path(), "ubuntu-24.04", &format!("{package}.yaml"), &sdf(&package));
    }
    write_sdf(
        dir.path(),
        "ubuntu-24.04",
        "broken.yaml",
        "package: broken\nslices: [unclosed\n",
    );

    let snapshot = pipeline(DirectoryRepository::new(dir.path(), "slices"))
        .run()
        .unwrap();

    assert_eq!(snapshot.definitions.len(), 10);
    let broken = snapshot.find("broken", "ubuntu-24.04").unwrap();
    assert!(broken.document.is_none());
    assert!(broken.version.is_none());
    let warnings: Vec<_> = broken.warnings().collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].code, PARSE_ERROR_CODE);

    let fine = snapshot.find("pkg3", "ubuntu-24.04").unwrap();
    assert!(fine.document.is_some());
    assert!(fine.is_clean(), "unexpected findings: {:?}", fine.findings);
    assert!(snapshot.meta.failed_branches.is_empty());
}

/// Wraps a directory repository and fails chosen operations.
struct Faulty {
    inner: DirectoryRepository,
    fail_listing: Option<&'static str>,
    fail_reads: HashMap<&'static str, fn(&str) -> FetchError>,
    list_calls: Mutex<HashMap<String, usize>>,
}

impl Faulty {
    fn new(root: &Path) -> Self {
        Self {
            inner: DirectoryRepository::new(root, "slices"),
            fail_listing: None,
            fail_reads: HashMap::new(),
            list_calls: Mutex::new(HashMap::new()),
        }
    }
}

impl ReleaseRepository for Faulty {
    fn describe(&self) -> String {
        "faulty".into()
    }

    fn branch_names(&self) -> Result<Vec<String>, FetchError> {
        self.inner.branch_names()
    }

    fn list_definitions(&self, branch: &str) -> Result<Vec<String>, FetchError> {
        *self
            .list_calls
            .lock()
            .unwrap()
            .entry(branch.to_string())
            .or_default() += 1;
        if self.fail_listing == Some(branch) {
            return Err(FetchError::Timeout {
                command: format!("git ls-tree origin/{branch}"),
                timeout: Duration::from_secs(1),
            });
        }
        self.inner.list_definitions(branch)
    }

    fn read_definition(&self, branch: &str, path: &str) -> Result<Vec<u8>, FetchError> {
        if let Some(make) = self.fail_reads.get(path) {
            return Err(make(branch));
        }
        self.inner.read_definition(branch, path)
    }
}

fn two_branch_fixture() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for branch in ["ubuntu-22.04", "ubuntu-24.04"] {
        write_sdf(dir.path(), branch, "foo.yaml", &sdf("foo"));
        write_sdf(dir.path(), branch, "bar.yaml", &sdf("bar"));
    }
    dir
}

#[test]
fn test_unlistable_branch_is_isolated() {
    let dir = two_branch_fixture();
    let mut repo = Faulty::new(dir.path());
    repo.fail_listing = Some("ubuntu-22.04");

    let snapshot = pipeline(repo).run().unwrap();

    let releases: Vec<_> = snapshot.releases.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(releases, vec!["ubuntu-24.04"]);
    assert!(snapshot.definitions.iter().all(|d| d.branch == "ubuntu-24.04"));
    assert_eq!(snapshot.definitions.len(), 2);

    assert_eq!(snapshot.meta.failed_branches.len(), 1);
    assert_eq!(snapshot.meta.failed_branches[0].branch, "ubuntu-22.04");
    assert!(snapshot.meta.failed_branches[0].error.contains("timed out"));
}

#[test]
fn test_unlistable_branch_is_retried() {
    let dir = two_branch_fixture();
    let mut repo = Faulty::new(dir.path());
    repo.fail_listing = Some("ubuntu-22.04");
    let repo = std::sync::Arc::new(repo);

    struct Shared(std::sync::Arc<Faulty>);
    impl ReleaseRepository for Shared {
        fn describe(&self) -> String {
            self.0.describe()
        }
        fn branch_names(&self) -> Result<Vec<String>, FetchError> {
            self.0.branch_names()
        }
        fn list_definitions(&self, branch: &str) -> Result<Vec<String>, FetchError> {
            self.0.list_definitions(branch)
        }
        fn read_definition(&self, branch: &str, path: &str) -> Result<Vec<u8>, FetchError> {
            self.0.read_definition(branch, path)
        }
    }

    pipeline(Shared(repo.clone())).run().unwrap();

    let calls = repo.list_calls.lock().unwrap();
    assert_eq!(calls["ubuntu-22.04"], 3);
    assert_eq!(calls["ubuntu-24.04"], 1);
}

#[test]
fn test_branch_vanishing_mid_read_fails_only_that_branch() {
    let dir = two_branch_fixture();
    let mut repo = Faulty::new(dir.path());
    repo.fail_reads
        .insert("slices/foo.yaml", |branch| FetchError::BranchMissing(branch.to_string()));

    let snapshot = pipeline(repo).run().unwrap();

    assert!(snapshot.releases.is_empty());
    assert!(snapshot.definitions.is_empty());
    let failed: Vec<_> = snapshot
        .meta
        .failed_branches
        .iter()
        .map(|f| f.branch.as_str())
        .collect();
    assert_eq!(failed, vec!["ubuntu-22.04", "ubuntu-24.04"]);
}

#[test]
fn test_unreadable_file_is_file_local() {
    let dir = two_branch_fixture();
    let mut repo = Faulty::new(dir.path());
    repo.fail_reads.insert("slices/bar.yaml", |_| FetchError::Command {
        command: "git show".into(),
        status: "exit status: 128".into(),
        stderr: "fatal: bad object".into(),
    });

    let snapshot = pipeline(repo).run().unwrap();

    assert_eq!(snapshot.releases.len(), 2);
    assert_eq!(snapshot.definitions.len(), 4);
    let bar = snapshot.find("bar", "ubuntu-22.04").unwrap();
    assert!(bar.is_missing());
    assert_eq!(bar.warnings().next().unwrap().code, PARSE_ERROR_CODE);
    assert!(snapshot.find("foo", "ubuntu-22.04").unwrap().document.is_some());
}

fn comparable(snapshot: &Snapshot) -> impl PartialEq + std::fmt::Debug + '_ {
    (
        &snapshot.meta,
        &snapshot.releases,
        &snapshot.definitions,
        &snapshot.descriptions,
    )
}

#[test]
fn test_output_is_independent_of_worker_count() {
    let dir = tempfile::tempdir().unwrap();
    for branch in ["ubuntu-20.04", "ubuntu-22.04", "ubuntu-24.04"] {
        for i in 0..20 {
            let package = format!("lib{i:02}");
            write_sdf(dir.path(), branch, &format!("{package}.yaml"), &sdf(&package));
        }
    }

    let serial = pipeline(DirectoryRepository::new(dir.path(), "slices"))
        .with_jobs(Some(1))
        .run()
        .unwrap();
    let parallel = pipeline(DirectoryRepository::new(dir.path(), "slices"))
        .with_jobs(Some(8))
        .run()
        .unwrap();

    assert_eq!(comparable(&serial), comparable(&parallel));
    assert_eq!(serial.definitions.len(), 60);
    assert_eq!(serial.definitions[0].package, "lib00");
    assert_eq!(serial.definitions[0].branch, "ubuntu-20.04");
    assert_eq!(serial.definitions[1].branch, "ubuntu-22.04");
}

#[test]
fn test_duplicate_key_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    write_sdf(dir.path(), "ubuntu-24.04", "foo.yaml", &sdf("foo"));
    write_sdf(dir.path(), "ubuntu-24.04", "foo.yml", &sdf("foo"));

    let err = pipeline(DirectoryRepository::new(dir.path(), "slices"))
        .run()
        .unwrap_err();

    assert!(matches!(err, ScanError::Assemble(_)));
    let message = err.to_string();
    assert!(message.contains("slices/foo.yaml"), "{message}");
    assert!(message.contains("slices/foo.yml"), "{message}");
}

#[test]
fn test_unknown_release_is_indexed_with_warning() {
    let dir = tempfile::tempdir().unwrap();
    write_sdf(dir.path(), "ubuntu-99.04", "foo.yaml", &sdf("foo"));
    write_sdf(dir.path(), "ubuntu-24.04", "foo.yaml", &sdf("foo"));
    fs::create_dir_all(dir.path().join("main/slices")).unwrap();

    let snapshot = pipeline(DirectoryRepository::new(dir.path(), "slices"))
        .run()
        .unwrap();

    let names: Vec<_> = snapshot.releases.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["ubuntu-24.04", "ubuntu-99.04"]);
    let unknown = &snapshot.releases[1];
    assert!(!unknown.flags.lts && !unknown.flags.supported && !unknown.flags.devel);
    assert!(snapshot.releases[0].flags.supported);
    assert_eq!(snapshot.meta.warnings.len(), 1);
    assert!(snapshot.meta.warnings[0].contains("ubuntu-99.04"));
}

fn write_index(mirror: &Path, suite: &str, component: &str, text: &str) {
    let dir = mirror
        .join("dists")
        .join(suite)
        .join(component)
        .join("binary-amd64");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("Packages"), text).unwrap();
}

#[test]
fn test_descriptions_from_mirror() {
    let repo_dir = tempfile::tempdir().unwrap();
    write_sdf(repo_dir.path(), "ubuntu-20.04", "foo.yaml", &sdf("foo"));
    write_sdf(repo_dir.path(), "ubuntu-24.04", "foo.yaml", &sdf("foo"));
    write_sdf(repo_dir.path(), "ubuntu-24.04", "bar.yaml", &sdf("bar"));

    let mirror = tempfile::tempdir().unwrap();
    write_index(
        mirror.path(),
        "focal",
        "main",
        "Package: foo\nSection: libs\nDescription: old text\n",
    );
    write_index(
        mirror.path(),
        "noble",
        "main",
        "Package: foo\nSection: libs\nDescription: new text\n",
    );
    write_index(
        mirror.path(),
        "noble-updates",
        "universe",
        "Package: bar\nSection: utils\nDescription: bar tool\n",
    );
    write_index(
        mirror.path(),
        "noble",
        "universe",
        "Package: unrelated\nDescription: no definition\n",
    );

    let snapshot = pipeline(DirectoryRepository::new(repo_dir.path(), "slices"))
        .with_package_source(Box::new(MirrorSource::new(mirror.path())))
        .with_index_settings(PackageIndexSettings {
            components: vec!["main".into(), "universe".into()],
            pockets: vec!["release".into(), "updates".into()],
            architecture: "amd64".into(),
        })
        .run()
        .unwrap();

    let texts: Vec<_> = snapshot
        .descriptions
        .iter()
        .map(|d| (d.package.as_str(), d.text.as_str()))
        .collect();
    assert_eq!(texts, vec![("bar", "bar tool"), ("foo", "new text")]);

    let bar = snapshot.find("bar", "ubuntu-24.04").unwrap();
    assert_eq!(bar.archive.component.as_deref(), Some("universe"));
    assert_eq!(bar.archive.repo.as_deref(), Some("updates"));
    assert_eq!(bar.archive.section.as_deref(), Some("utils"));

    let old_foo = snapshot.find("foo", "ubuntu-20.04").unwrap();
    assert_eq!(old_foo.archive.repo.as_deref(), Some("release"));

    // Indexes missing from the mirror are warnings, not failures.
    assert!(snapshot.meta.failed_branches.is_empty());
    assert!(
        snapshot
            .meta
            .warnings
            .iter()
            .any(|w| w.contains("focal-updates/universe/binary-amd64"))
    );
}
