//! Release repository backends.
//!
//! A [`ReleaseRepository`] answers three questions: which branches exist,
//! which definition files a branch has, and what bytes a file holds. Every
//! call is independent, so re-reading a branch never depends on earlier
//! calls and branches can be read concurrently.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::FetchError;
use crate::git::{is_missing_ref, run_git, run_git_text};

/// Read-only access to the slice definitions of every release branch.
pub trait ReleaseRepository: Send + Sync {
    /// Human-readable location, for logs.
    fn describe(&self) -> String;

    /// All branch names, unfiltered.
    fn branch_names(&self) -> Result<Vec<String>, FetchError>;

    /// Repository-relative paths of the definition files on `branch`.
    fn list_definitions(&self, branch: &str) -> Result<Vec<String>, FetchError>;

    /// Raw bytes of one definition file.
    fn read_definition(&self, branch: &str, path: &str) -> Result<Vec<u8>, FetchError>;
}

/// Returns `true` for `<slices_dir>/<name>.yaml` or `.yml` directly inside
/// the definition directory.
///
/// # Examples
///
/// ```
/// use slice_index_scan::is_definition_path;
///
/// assert!(is_definition_path("slices", "slices/libc6.yaml"));
/// assert!(is_definition_path("slices", "slices/libc6.yml"));
/// assert!(!is_definition_path("slices", "slices/nested/libc6.yaml"));
/// assert!(!is_definition_path("slices", "slices/README.md"));
/// assert!(!is_definition_path("slices", "chisel.yaml"));
/// ```
pub fn is_definition_path(slices_dir: &str, path: &str) -> bool {
    let dir = slices_dir.trim_end_matches('/');
    let Some(name) = path
        .strip_prefix(dir)
        .and_then(|rest| rest.strip_prefix('/'))
    else {
        return false;
    };
    if name.contains('/') {
        return false;
    }
    match name.rsplit_once('.') {
        Some((stem, ext)) => !stem.is_empty() && matches!(ext, "yaml" | "yml"),
        None => false,
    }
}

/// Reads branches straight from the remote-tracking refs of a clone.
///
/// Files are listed with `git ls-tree` and read with `git show`, so no
/// checkout or worktree is involved.
#[derive(Debug, Clone)]
pub struct GitRepository {
    dir: PathBuf,
    slices_dir: String,
    remote: String,
    timeout: Duration,
}

impl GitRepository {
    pub fn new(dir: impl Into<PathBuf>, slices_dir: impl Into<String>, timeout: Duration) -> Self {
        Self {
            dir: dir.into(),
            slices_dir: slices_dir.into(),
            remote: "origin".to_string(),
            timeout,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn tree_ref(&self, branch: &str) -> String {
        format!("{}/{branch}", self.remote)
    }

    fn branch_error(&self, branch: &str, err: FetchError) -> FetchError {
        if is_missing_ref(&err) {
            FetchError::BranchMissing(branch.to_string())
        } else {
            err
        }
    }
}

impl ReleaseRepository for GitRepository {
    fn describe(&self) -> String {
        format!("git clone at {}", self.dir.display())
    }

    fn branch_names(&self) -> Result<Vec<String>, FetchError> {
        let refs = format!("refs/remotes/{}", self.remote);
        let output = run_git_text(
            Some(&self.dir),
            &["for-each-ref", "--format=%(refname:short)", &refs],
            self.timeout,
        )?;
        let prefix = format!("{}/", self.remote);
        let mut names: Vec<String> = output
            .lines()
            .filter_map(|line| line.trim().strip_prefix(&prefix))
            .filter(|name| *name != "HEAD")
            .map(str::to_string)
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    fn list_definitions(&self, branch: &str) -> Result<Vec<String>, FetchError> {
        let tree = self.tree_ref(branch);
        let dir = format!("{}/", self.slices_dir.trim_end_matches('/'));
        let output = run_git_text(
            Some(&self.dir),
            &["ls-tree", "-z", "--name-only", &tree, &dir],
            self.timeout,
        )
        .map_err(|e| self.branch_error(branch, e))?;

        Ok(definition_paths(&self.slices_dir, &output))
    }

    fn read_definition(&self, branch: &str, path: &str) -> Result<Vec<u8>, FetchError> {
        let object = format!("{}:{path}", self.tree_ref(branch));
        run_git(Some(&self.dir), &["show", &object], self.timeout)
            .map_err(|e| self.branch_error(branch, e))
    }
}

/// Splits NUL-terminated `ls-tree -z` output into sorted definition paths.
///
/// Without `-z` git C-quotes names containing non-ASCII bytes.
fn definition_paths(slices_dir: &str, output: &str) -> Vec<String> {
    let mut paths: Vec<String> = output
        .split('\0')
        .filter(|path| is_definition_path(slices_dir, path))
        .map(str::to_string)
        .collect();
    paths.sort();
    paths
}

/// Reads branches from plain directories: `<root>/<branch>/<slices_dir>/`.
///
/// Used for offline runs and fixtures.
#[derive(Debug, Clone)]
pub struct DirectoryRepository {
    root: PathBuf,
    slices_dir: String,
}

impl DirectoryRepository {
    pub fn new(root: impl Into<PathBuf>, slices_dir: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            slices_dir: slices_dir.into(),
        }
    }

    fn branch_dir(&self, branch: &str) -> PathBuf {
        self.root.join(branch)
    }
}

impl ReleaseRepository for DirectoryRepository {
    fn describe(&self) -> String {
        format!("directory tree at {}", self.root.display())
    }

    fn branch_names(&self) -> Result<Vec<String>, FetchError> {
        if !self.root.is_dir() {
            return Err(FetchError::NotFound(self.root.clone()));
        }
        let entries = std::fs::read_dir(&self.root)
            .map_err(|e| FetchError::io(format!("listing {}", self.root.display()), e))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| FetchError::io(format!("listing {}", self.root.display()), e))?;
            if entry.path().is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn list_definitions(&self, branch: &str) -> Result<Vec<String>, FetchError> {
        let branch_dir = self.branch_dir(branch);
        if !branch_dir.is_dir() {
            return Err(FetchError::BranchMissing(branch.to_string()));
        }
        let slices = branch_dir.join(&self.slices_dir);
        if !slices.is_dir() {
            return Ok(Vec::new());
        }

        let entries = std::fs::read_dir(&slices)
            .map_err(|e| FetchError::io(format!("listing {}", slices.display()), e))?;
        let dir = self.slices_dir.trim_end_matches('/');
        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| FetchError::io(format!("listing {}", slices.display()), e))?;
            if !entry.path().is_file() {
                continue;
            }
            let path = format!("{dir}/{}", entry.file_name().to_string_lossy());
            if is_definition_path(&self.slices_dir, &path) {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    fn read_definition(&self, branch: &str, path: &str) -> Result<Vec<u8>, FetchError> {
        let file = self.branch_dir(branch).join(path);
        std::fs::read(&file).map_err(|e| FetchError::io(format!("reading {}", file.display()), e))
    }
}
