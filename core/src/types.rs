//! Data model for indexed slice definitions.
//!
//! These types describe one indexing run: the release [`Branch`]es that were
//! scanned, the per-file [`Definition`]s found on them, the classified
//! [`Finding`]s attached to each definition and the per-package
//! [`Description`]s. All of them are plain values; they are produced once by
//! the pipeline and never mutated after the snapshot is assembled.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::version::Version;

/// Version of the persisted snapshot layout.
///
/// Written into the snapshot `meta` table so that consumers can detect
/// layout changes.
pub const SNAPSHOT_SCHEMA_VERSION: &str = "1";

/// Lifecycle flags of an Ubuntu release.
///
/// # Examples
///
/// ```
/// use slice_index_core::ReleaseFlags;
///
/// let flags = ReleaseFlags::default();
/// assert!(!flags.lts && !flags.supported && !flags.devel);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReleaseFlags {
    /// Long-term-support release.
    pub lts: bool,
    /// Currently inside its support window.
    pub supported: bool,
    /// The release under development.
    pub devel: bool,
}

/// One tracked release branch of the slice definition repository.
///
/// # Examples
///
/// ```
/// use slice_index_core::Branch;
///
/// let branch = Branch::new("ubuntu-24.04");
/// assert_eq!(branch.release_version(), Some((24, 4)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    /// Branch name, e.g. `ubuntu-24.04`.
    pub name: String,
    /// Release series codename (e.g. `noble`) when the release calendar knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codename: Option<String>,
    /// Lifecycle flags.
    pub flags: ReleaseFlags,
}

impl Branch {
    /// Creates a branch with all lifecycle flags unset.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            codename: None,
            flags: ReleaseFlags::default(),
        }
    }

    /// Sets the lifecycle flags.
    pub fn with_flags(mut self, flags: ReleaseFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Sets the release series codename.
    pub fn with_codename(mut self, codename: impl Into<String>) -> Self {
        self.codename = Some(codename.into());
        self
    }

    /// Returns the `(year, month)` release number encoded in the branch name.
    pub fn release_version(&self) -> Option<(u32, u32)> {
        release_number(&self.name)
    }
}

/// Extracts the `YY.MM` release number from a branch name like `ubuntu-22.04`.
pub fn release_number(branch: &str) -> Option<(u32, u32)> {
    let tail = branch.rsplit('-').next()?;
    let (year, month) = tail.split_once('.')?;
    Some((year.parse().ok()?, month.parse().ok()?))
}

/// Orders branch names by release number, falling back to byte order.
///
/// Names carrying a release number sort after names that do not, so that
/// `ubuntu-24.04` is always "newer" than an unversioned branch.
///
/// # Examples
///
/// ```
/// use std::cmp::Ordering;
/// use slice_index_core::compare_branches;
///
/// assert_eq!(compare_branches("ubuntu-20.04", "ubuntu-24.04"), Ordering::Less);
/// assert_eq!(compare_branches("ubuntu-9.10", "ubuntu-10.04"), Ordering::Less);
/// ```
pub fn compare_branches(a: &str, b: &str) -> Ordering {
    match (release_number(a), release_number(b)) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}

/// Severity of a [`Finding`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational; stylistic or heuristic.
    Note,
    /// Actionable; surfaced prominently to consumers.
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Note => write!(f, "note"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// Code of the synthetic finding attached to definitions that fail to parse.
pub const PARSE_ERROR_CODE: &str = "parse-error";

/// A classified quality issue detected in one slice definition file.
///
/// Serialized as `{"note": "<code>"}` or `{"warning": "<code>"}` with
/// optional `text` and `line` members.
///
/// # Examples
///
/// ```
/// use slice_index_core::Finding;
///
/// let finding = Finding::warning("double-glob").with_line(4);
/// let json = serde_json::to_string(&finding).unwrap();
/// assert_eq!(json, r#"{"warning":"double-glob","line":4}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "FindingRepr", try_from = "FindingRepr")]
pub struct Finding {
    /// Note or warning.
    pub severity: Severity,
    /// Stable machine-readable code, e.g. `double-glob`.
    pub code: String,
    /// Optional human-readable detail.
    pub text: Option<String>,
    /// Optional 1-based line in the raw definition text.
    pub line: Option<usize>,
}

impl Finding {
    /// Creates a finding without detail.
    pub fn new(severity: Severity, code: impl Into<String>) -> Self {
        Self {
            severity,
            code: code.into(),
            text: None,
            line: None,
        }
    }

    /// Creates a note-severity finding.
    pub fn note(code: impl Into<String>) -> Self {
        Self::new(Severity::Note, code)
    }

    /// Creates a warning-severity finding.
    pub fn warning(code: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code)
    }

    /// Attaches detail text.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Attaches a 1-based line number.
    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    /// True for actionable findings; false for notes.
    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }
}

#[derive(Serialize, Deserialize)]
struct FindingRepr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    line: Option<usize>,
}

impl From<Finding> for FindingRepr {
    fn from(finding: Finding) -> Self {
        let (note, warning) = match finding.severity {
            Severity::Note => (Some(finding.code), None),
            Severity::Warning => (None, Some(finding.code)),
        };
        Self {
            note,
            warning,
            text: finding.text,
            line: finding.line,
        }
    }
}

impl TryFrom<FindingRepr> for Finding {
    type Error = String;

    fn try_from(repr: FindingRepr) -> Result<Self, Self::Error> {
        let (severity, code) = match (repr.note, repr.warning) {
            (Some(code), None) => (Severity::Note, code),
            (None, Some(code)) => (Severity::Warning, code),
            _ => return Err("finding must carry exactly one of `note` or `warning`".to_string()),
        };
        Ok(Self {
            severity,
            code,
            text: repr.text,
            line: repr.line,
        })
    }
}

/// Where a package lives in the Ubuntu archive for one release.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ArchiveInfo {
    /// Archive component (`main`, `universe`, ...).
    pub component: Option<String>,
    /// Archive pocket (`release`, `updates`, `security`, `backports`).
    pub repo: Option<String>,
    /// Debian section (`libs`, `utils`, ...).
    pub section: Option<String>,
}

/// Structured content of a slice definition file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SliceDefinition {
    /// Declared `package:` field.
    pub package: Option<String>,
    /// Declared `archive:` field.
    pub archive: Option<String>,
    /// Declared package-level `version:` field.
    pub version: Option<String>,
    /// Package-level essential slices.
    pub essential: Vec<String>,
    /// Slices in document order.
    pub slices: Vec<Slice>,
}

impl SliceDefinition {
    /// Looks up a slice by name.
    pub fn find_slice(&self, name: &str) -> Option<&Slice> {
        self.slices.iter().find(|slice| slice.name == name)
    }

    /// Iterates over all content entries of all slices, with their slice.
    pub fn content_entries(&self) -> impl Iterator<Item = (&Slice, &ContentEntry)> {
        self.slices
            .iter()
            .flat_map(|slice| slice.contents.iter().map(move |entry| (slice, entry)))
    }
}

/// One named slice inside a definition.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Slice {
    pub name: String,
    /// Essential slices in document order.
    pub essential: Vec<String>,
    /// Content entries in document order.
    pub contents: Vec<ContentEntry>,
    /// Mutation script, when present.
    pub mutate: Option<String>,
    /// Slice-level `version:` override.
    pub version: Option<String>,
}

/// One path entry under a slice's `contents`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentEntry {
    /// Target path or glob.
    pub path: String,
    pub rule: ContentRule,
    /// Architectures the entry is restricted to (empty = all).
    pub arch: Vec<String>,
    /// Declared file mode.
    pub mode: Option<u32>,
    /// `until:` lifecycle marker, e.g. `mutate`.
    pub until: Option<String>,
    /// Whether the mutation script may modify the path.
    pub mutable: bool,
}

/// How a content entry produces its path.
///
/// A closed set of the rule kinds the format defines, with [`Unknown`]
/// holding anything the parser does not recognize.
///
/// [`Unknown`]: ContentRule::Unknown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentRule {
    /// Literal path extracted from the package.
    Extract,
    /// Glob pattern extracted from the package.
    Glob,
    /// Copy of another path in the package.
    Copy { from: String },
    /// File with inline text.
    Text { text: String },
    /// Symbolic link.
    Symlink { target: String },
    /// Directory created by the slicer.
    Dir,
    /// Generated content such as the slice manifest.
    Generate {
        #[serde(rename = "generate")]
        kind: String,
    },
    /// Unrecognized rule, kept verbatim.
    Unknown { raw: serde_json::Value },
}

impl ContentRule {
    /// Returns `true` when the rule matches paths by pattern.
    pub fn is_glob(&self) -> bool {
        matches!(self, Self::Glob)
    }
}

/// Returns `true` if `path` contains glob metacharacters.
pub fn is_glob_pattern(path: &str) -> bool {
    path.contains('*') || path.contains('?')
}

/// One slice definition file on one branch.
///
/// The `(package, branch)` pair is the natural key; the snapshot never holds
/// two definitions with the same pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Definition {
    /// Package key (file name minus extension).
    pub package: String,
    /// Branch the file was read from.
    pub branch: String,
    /// Repository-relative path of the file.
    pub path: String,
    /// Raw file text, verbatim (lossy UTF-8 for undecodable bytes).
    pub raw: String,
    /// The parsed document as JSON, `None` when the file did not parse.
    pub document: Option<serde_json::Value>,
    /// Structured view of the document, `None` when the file did not parse.
    pub parsed: Option<SliceDefinition>,
    /// Resolved declared version; `None` when nothing is declared.
    pub version: Option<Version>,
    /// Findings in checker registration order.
    pub findings: Vec<Finding>,
    /// Short SHA-256 fingerprint of the raw bytes.
    pub fingerprint: String,
    /// Archive placement of the package on this branch.
    pub archive: ArchiveInfo,
}

impl Definition {
    /// Returns the natural `(package, branch)` key.
    pub fn key(&self) -> (&str, &str) {
        (&self.package, &self.branch)
    }

    /// Findings with note severity, in order.
    pub fn notes(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.severity == Severity::Note)
    }

    /// Findings with warning severity, in order.
    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.is_warning())
    }

    /// A definition is clean when no findings were recorded.
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    /// Returns `true` when the file failed to parse.
    pub fn is_missing(&self) -> bool {
        self.document.is_none()
    }

    /// Label shown for the definition: its version, or the fingerprint.
    pub fn display_label(&self) -> String {
        match &self.version {
            Some(version) => version.display(),
            None => self.fingerprint.clone(),
        }
    }
}

/// Human-readable description of one package, independent of branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Description {
    pub package: String,
    pub text: String,
}
