use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Helper to create a temp directory that is cleaned up on drop.
struct TempDir {
    path: PathBuf,
}

impl TempDir {
    fn new(name: &str) -> Self {
        let path = std::env::temp_dir().join(format!(
            "slice_index_cli_test_{name}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&path);
        fs::create_dir_all(&path).expect("failed to create temp dir");
        Self { path }
    }

    fn path(&self) -> &PathBuf {
        &self.path
    }

    fn join(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

const CALENDAR: &str = "\
version,codename,series,created,release,eol,eol-server
22.04 LTS,Jammy Jellyfish,jammy,2021-10-14,2022-04-21,2027-06-01,2027-06-01
24.04 LTS,Noble Numbat,noble,2023-10-26,2024-04-25,2029-05-31,2029-05-31
";

fn sdf(package: &str) -> String {
    format!(
        "package: {package}\n\nessential:\n  - {package}_copyright\n\nslices:\n  bins:\n    contents:\n      /usr/bin/{package}:\n\n  copyright:\n    contents:\n      /usr/share/doc/{package}/copyright:\n"
    )
}

fn write_sdf(root: &Path, branch: &str, file: &str, text: &str) {
    let dir = root.join(branch).join("slices");
    fs::create_dir_all(&dir).expect("failed to create slices dir");
    fs::write(dir.join(file), text).expect("failed to write definition");
}

/// Two branches with two packages each, plus the release calendar.
fn write_fixture(dir: &TempDir) -> (PathBuf, PathBuf) {
    let repo = dir.join("releases");
    for branch in ["ubuntu-22.04", "ubuntu-24.04"] {
        write_sdf(&repo, branch, "hello.yaml", &sdf("hello"));
        write_sdf(&repo, branch, "base-files.yaml", &sdf("base-files"));
    }
    let calendar = dir.join("ubuntu.csv");
    fs::write(&calendar, CALENDAR).expect("failed to write calendar");
    (repo, calendar)
}

fn slice_index(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_slice-index"))
        .args(args)
        .env_remove("SLICE_INDEX_LOG")
        .output()
        .expect("failed to run slice-index")
}

fn compile(repo: &Path, calendar: &Path, db: &Path, extra: &[&str]) -> Output {
    let mut args = vec![
        "-q",
        "compile",
        db.to_str().unwrap(),
        "--source",
        "dir",
        "--repo",
        repo.to_str().unwrap(),
        "--distro-info",
        calendar.to_str().unwrap(),
        "--descriptions",
        "none",
    ];
    args.extend_from_slice(extra);
    slice_index(&args)
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// ---------------------------------------------------------------------------
// compile
// ---------------------------------------------------------------------------

#[test]
fn compile_writes_database_artifact_and_checksum() {
    let dir = TempDir::new("compile_artifact");
    let (repo, calendar) = write_fixture(&dir);
    let db = dir.join("index.db");

    let output = compile(&repo, &calendar, &db, &["-j", "2"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("4 definitions"));

    assert!(db.exists());
    assert!(dir.join("index.db.gz").exists());
    let sidecar = fs::read_to_string(dir.join("index.db.gz.sha256")).unwrap();
    assert!(sidecar.ends_with("  index.db.gz\n"));
    assert_eq!(sidecar.split_whitespace().next().unwrap().len(), 64);
}

#[test]
fn compile_without_compression_skips_artifact() {
    let dir = TempDir::new("compile_no_compress");
    let (repo, calendar) = write_fixture(&dir);
    let db = dir.join("index.db");

    let output = compile(&repo, &calendar, &db, &["--no-compress"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(db.exists());
    assert!(!dir.join("index.db.gz").exists());
}

#[test]
fn compile_refuses_to_overwrite_without_force() {
    let dir = TempDir::new("compile_force");
    let (repo, calendar) = write_fixture(&dir);
    let db = dir.join("index.db");

    let first = compile(&repo, &calendar, &db, &["--no-compress"]);
    assert!(first.status.success(), "stderr: {}", stderr(&first));

    let second = compile(&repo, &calendar, &db, &["--no-compress"]);
    assert!(!second.status.success());
    assert!(stderr(&second).contains("--force"));

    let forced = compile(&repo, &calendar, &db, &["--no-compress", "--force"]);
    assert!(forced.status.success(), "stderr: {}", stderr(&forced));
}

#[test]
fn compile_fails_on_duplicate_definition_key() {
    let dir = TempDir::new("compile_duplicate");
    let (repo, calendar) = write_fixture(&dir);
    write_sdf(&repo, "ubuntu-24.04", "hello.yml", &sdf("hello"));
    let db = dir.join("index.db");

    let output = compile(&repo, &calendar, &db, &["--no-compress"]);
    assert!(!output.status.success());
    assert!(stderr(&output).starts_with("error:"));
    assert!(!db.exists(), "no snapshot may be written on a fatal error");
}

#[test]
fn compile_rejects_zero_jobs() {
    let dir = TempDir::new("compile_jobs");
    let (repo, calendar) = write_fixture(&dir);

    let output = compile(&repo, &calendar, &dir.join("index.db"), &["-j", "0"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("--jobs"));
}

#[test]
fn compile_with_missing_calendar_still_indexes() {
    let dir = TempDir::new("compile_no_calendar");
    let (repo, _) = write_fixture(&dir);
    let db = dir.join("index.db");

    let output = compile(&repo, &dir.join("absent.csv"), &db, &["--no-compress"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let info = slice_index(&["info", db.to_str().unwrap(), "--json"]);
    let value: serde_json::Value = serde_json::from_slice(&info.stdout).unwrap();
    let warnings: Vec<String> =
        serde_json::from_str(value["meta"]["warnings"].as_str().unwrap()).unwrap();
    assert_eq!(warnings.len(), 2);
    assert!(warnings.iter().all(|w| w.contains("no release metadata")));
}

// ---------------------------------------------------------------------------
// info
// ---------------------------------------------------------------------------

#[test]
fn info_reports_stats_and_releases() {
    let dir = TempDir::new("info");
    let (repo, calendar) = write_fixture(&dir);
    let db = dir.join("index.db");
    assert!(compile(&repo, &calendar, &db, &["--no-compress"]).status.success());

    let output = slice_index(&["info", db.to_str().unwrap()]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let text = stdout(&output);
    assert!(text.contains("Rows: 4"));
    assert!(text.contains("Packages: 2"));
    assert!(text.contains("ubuntu-22.04 [lts"));
    assert!(text.contains("schema_version: 1"));

    let json = slice_index(&["info", db.to_str().unwrap(), "--json"]);
    let value: serde_json::Value = serde_json::from_slice(&json.stdout).unwrap();
    assert_eq!(value["stats"]["releases"], 2);
    assert_eq!(value["releases"][0]["branch"], "ubuntu-22.04");
    assert_eq!(value["releases"][1]["branch"], "ubuntu-24.04");
}

#[test]
fn info_rejects_missing_database() {
    let dir = TempDir::new("info_missing");
    let output = slice_index(&["info", dir.join("nope.db").to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("error:"));
}

// ---------------------------------------------------------------------------
// lint
// ---------------------------------------------------------------------------

#[test]
fn lint_prints_findings_as_json() {
    let dir = TempDir::new("lint");
    let clean = dir.join("hello.yaml");
    fs::write(&clean, sdf("hello")).unwrap();
    let bare = dir.join("bare.yaml");
    fs::write(&bare, "package: bare\nslices:\n  bins:\n    contents:\n      /usr/bin/bare:\n")
        .unwrap();

    let output = slice_index(&["lint", clean.to_str().unwrap(), bare.to_str().unwrap()]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let reports: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(reports[0]["package"], "hello");
    assert_eq!(reports[0]["findings"].as_array().unwrap().len(), 0);
    assert_eq!(reports[1]["package"], "bare");
    assert_eq!(reports[1]["findings"][0]["warning"], "missing-copyright");
}

#[test]
fn lint_strict_exits_nonzero_on_warnings() {
    let dir = TempDir::new("lint_strict");
    let broken = dir.join("broken.yaml");
    fs::write(&broken, "package: broken\nslices: [unclosed\n").unwrap();

    let output = slice_index(&["lint", "--strict", broken.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(2));
    let reports: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(reports[0]["findings"][0]["warning"], "parse-error");
}

#[test]
fn lint_reports_unreadable_file() {
    let dir = TempDir::new("lint_missing");
    let output = slice_index(&["lint", dir.path().join("absent.yaml").to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Failed to read"));
}
