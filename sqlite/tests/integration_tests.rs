//! Integration tests for the slice-index-sqlite crate.

use chrono::{DateTime, TimeZone, Utc};
use slice_index_core::{
    ArchiveInfo, Branch, BranchFailure, Definition, Description, Meta, ReleaseFlags, Severity,
    Snapshot,
};
use slice_index_sqlite::{SnapshotReader, SqliteError, write_snapshot};

const VERSIONED: &str = "package: libfoo1\nversion: 1:2.3-1ubuntu2\nslices:\n  libs:\n    contents:\n      /usr/lib/libfoo.so.1*:\n";
const PLAIN: &str = "package: bar\nslices:\n  bins:\n    contents:\n      /usr/bin/bar:\n";
const BROKEN: &str = "package: baz\nslices: [unclosed\n";

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap()
}

fn flags(lts: bool, supported: bool, devel: bool) -> ReleaseFlags {
    ReleaseFlags {
        lts,
        supported,
        devel,
    }
}

/// Builds a small but complete snapshot stamped at `time`.
fn sample_snapshot(time: DateTime<Utc>) -> Snapshot {
    let mut meta = Meta::at("test", time);
    meta.failed_branches
        .push(BranchFailure::new("ubuntu-23.10", "branch not found: ubuntu-23.10"));
    meta.warnings.push("ubuntu-99.04: no release metadata".to_string());

    let releases = vec![
        Branch::new("ubuntu-24.04").with_flags(flags(true, true, false)),
        Branch::new("ubuntu-22.04").with_flags(flags(true, true, false)),
        Branch::new("ubuntu-25.10").with_flags(flags(false, false, true)),
    ];

    let mut libfoo = Definition::from_bytes("ubuntu-24.04", "slices/libfoo1.yaml", VERSIONED.as_bytes());
    libfoo.archive = ArchiveInfo {
        component: Some("main".to_string()),
        repo: Some("updates".to_string()),
        section: Some("libs".to_string()),
    };
    let mut bar = Definition::from_bytes("ubuntu-22.04", "slices/bar.yaml", PLAIN.as_bytes());
    bar.findings
        .push(slice_index_core::Finding::note("unsorted-content").with_text("slice bins"));

    let definitions = vec![
        Definition::from_bytes("ubuntu-25.10", "slices/bar.yaml", PLAIN.as_bytes()),
        libfoo,
        bar,
        Definition::from_bytes("ubuntu-24.04", "slices/baz.yaml", BROKEN.as_bytes()),
    ];

    let descriptions = vec![
        Description {
            package: "libfoo1".to_string(),
            text: "Foo library\n\nShared objects.".to_string(),
        },
        Description {
            package: "orphan".to_string(),
            text: "never indexed".to_string(),
        },
    ];

    Snapshot::assemble(meta, releases, definitions, descriptions).unwrap()
}

fn write(snapshot: &Snapshot) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.db");
    write_snapshot(snapshot, &path, false).unwrap();
    (dir, path)
}

// =============================================================================
// Contract
// =============================================================================

#[test]
fn test_releases_round_trip_in_branch_order() {
    let (_dir, path) = write(&sample_snapshot(at(12)));
    let reader = SnapshotReader::open(&path).unwrap();

    let releases = reader.releases().unwrap();
    let names: Vec<_> = releases.iter().map(|r| r.branch.as_str()).collect();
    assert_eq!(names, vec!["ubuntu-22.04", "ubuntu-24.04", "ubuntu-25.10"]);
    assert!(releases[0].lts && releases[0].supported && !releases[0].devel);
    assert!(releases[2].devel && !releases[2].supported);
}

#[test]
fn test_version_and_definition_nullability() {
    let (_dir, path) = write(&sample_snapshot(at(12)));
    let reader = SnapshotReader::open(&path).unwrap();

    let libfoo = reader.slice("libfoo1", "ubuntu-24.04").unwrap().unwrap();
    assert_eq!(libfoo.version.as_deref(), Some("1:2.3-1ubuntu2"));
    assert_eq!(libfoo.label(), "1:2.3-1ubuntu2");
    assert_eq!(libfoo.definition.as_ref().unwrap()["package"], "libfoo1");
    assert_eq!(libfoo.component.as_deref(), Some("main"));
    assert_eq!(libfoo.repo.as_deref(), Some("updates"));
    assert_eq!(libfoo.section.as_deref(), Some("libs"));

    let bar = reader.slice("bar", "ubuntu-22.04").unwrap().unwrap();
    assert_eq!(bar.version, None, "no declared version must stay NULL");
    assert_eq!(bar.label(), bar.fingerprint);
    assert_eq!(bar.fingerprint.len(), 12);
    assert_eq!(bar.component, None);
    assert_eq!(bar.raw_definition, PLAIN);

    let baz = reader.slice("baz", "ubuntu-24.04").unwrap().unwrap();
    assert!(baz.definition.is_none());
    assert!(baz.version.is_none());
    assert_eq!(baz.raw_definition, BROKEN);
    assert_eq!(baz.warnings.len(), 1);
    assert_eq!(baz.warnings[0].severity, Severity::Warning);
    assert_eq!(baz.warnings[0].code, "parse-error");
}

#[test]
fn test_findings_columns_are_json_arrays() {
    let (_dir, path) = write(&sample_snapshot(at(12)));
    let conn = rusqlite::Connection::open(&path).unwrap();

    let (notes, warnings): (String, String) = conn
        .query_row(
            "SELECT notes, warnings FROM slice WHERE package = 'bar' AND branch = 'ubuntu-22.04'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(notes, r#"[{"note":"unsorted-content","text":"slice bins"}]"#);
    assert_eq!(warnings, "[]");

    let nulls: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM slice WHERE notes IS NULL OR warnings IS NULL",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(nulls, 0);
}

#[test]
fn test_meta_rows() {
    let (_dir, path) = write(&sample_snapshot(at(12)));
    let reader = SnapshotReader::open(&path).unwrap();

    assert_eq!(
        reader.meta("last_update").unwrap().as_deref(),
        Some("2024-05-01T12:00:00Z")
    );
    assert_eq!(reader.meta("schema_version").unwrap().as_deref(), Some("1"));
    let failed: serde_json::Value =
        serde_json::from_str(&reader.meta("failed_branches").unwrap().unwrap()).unwrap();
    assert_eq!(failed[0]["branch"], "ubuntu-23.10");

    let keys: Vec<_> = reader
        .meta_rows()
        .unwrap()
        .into_iter()
        .map(|(key, _)| key)
        .collect();
    assert_eq!(
        keys,
        vec!["failed_branches", "last_update", "schema_version", "tool_version", "warnings"]
    );
}

#[test]
fn test_descriptions_and_package_rows() {
    let (_dir, path) = write(&sample_snapshot(at(12)));
    let reader = SnapshotReader::open(&path).unwrap();

    assert_eq!(
        reader.description("libfoo1").unwrap().as_deref(),
        Some("Foo library\n\nShared objects.")
    );
    assert!(reader.description("orphan").unwrap().is_none());

    let bar_rows = reader.package_rows("bar").unwrap();
    let branches: Vec<_> = bar_rows.iter().map(|r| r.branch.as_str()).collect();
    assert_eq!(branches, vec!["ubuntu-22.04", "ubuntu-25.10"]);

    assert_eq!(reader.packages().unwrap(), vec!["bar", "baz", "libfoo1"]);
}

#[test]
fn test_stats() {
    let (_dir, path) = write(&sample_snapshot(at(12)));
    let stats = SnapshotReader::open(&path).unwrap().stats().unwrap();

    assert_eq!(stats.rows, 4);
    assert_eq!(stats.releases, 3);
    assert_eq!(stats.packages, 3);
    assert_eq!(stats.descriptions, 1);
    assert_eq!(stats.unparsed, 1);
    assert_eq!(stats.with_warnings, 1);
    assert_eq!(stats.versioned, 1);
}

// =============================================================================
// Determinism
// =============================================================================

#[test]
fn test_identical_snapshots_write_identical_bytes() {
    let (_a, first) = write(&sample_snapshot(at(12)));
    let (_b, second) = write(&sample_snapshot(at(12)));

    let first = std::fs::read(first).unwrap();
    let second = std::fs::read(second).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_only_timestamp_differs_between_runs() {
    let (_a, first) = write(&sample_snapshot(at(12)));
    let (_b, second) = write(&sample_snapshot(at(13)));
    let first = SnapshotReader::open(first).unwrap();
    let second = SnapshotReader::open(second).unwrap();

    assert_ne!(
        first.meta("last_update").unwrap(),
        second.meta("last_update").unwrap()
    );
    for package in first.packages().unwrap() {
        assert_eq!(
            first.package_rows(&package).unwrap(),
            second.package_rows(&package).unwrap()
        );
    }
    assert_eq!(first.releases().unwrap(), second.releases().unwrap());
}

// =============================================================================
// Failure modes
// =============================================================================

#[test]
fn test_reader_rejects_foreign_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("other.db");
    rusqlite::Connection::open(&path)
        .unwrap()
        .execute_batch("CREATE TABLE commands (id INTEGER);")
        .unwrap();

    let err = SnapshotReader::open(&path).err().unwrap();
    assert!(matches!(err, SqliteError::NotASnapshot(_)));
}

#[test]
fn test_existing_output_is_kept_without_overwrite() {
    let snapshot = sample_snapshot(at(12));
    let (_dir, path) = write(&snapshot);
    let before = std::fs::read(&path).unwrap();

    let err = write_snapshot(&snapshot, &path, false).unwrap_err();
    assert!(matches!(err, SqliteError::OutputExists(_)));
    assert_eq!(std::fs::read(&path).unwrap(), before);
}
