//! Debian `Packages` indexes as the source of descriptions and archive
//! placement.
//!
//! For each branch the indexes of every configured component and pocket are
//! read in order; the first entry seen for a package wins. A missing index is
//! not an error for the run: it is logged and reported as a warning, and the
//! affected packages simply get no description.

use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;

use flate2::read::GzDecoder;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::retry::RetryConfig;

/// Pocket name standing for the bare release suite.
pub const RELEASE_POCKET: &str = "release";

/// Archive placement and description of one binary package.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PackageInfo {
    pub description: Option<String>,
    pub section: Option<String>,
    pub component: String,
    pub repo: String,
}

/// One stanza of a `Packages` index, reduced to the fields we keep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRecord {
    pub package: String,
    pub description: Option<String>,
    pub section: Option<String>,
}

/// Supplies decompressed `Packages` indexes.
pub trait PackageIndexSource: Send + Sync {
    /// Human-readable location, for logs.
    fn describe(&self) -> String;

    /// Returns the index text for one suite/component/architecture, or
    /// `None` when the source has no such index.
    fn fetch_index(
        &self,
        suite: &str,
        component: &str,
        arch: &str,
    ) -> Result<Option<String>, FetchError>;
}

/// Archive suite for a series and pocket: `noble`, `noble-updates`, ...
pub fn suite_name(series: &str, pocket: &str) -> String {
    if pocket == RELEASE_POCKET || pocket.is_empty() {
        series.to_string()
    } else {
        format!("{series}-{pocket}")
    }
}

/// Parses a `Packages` index.
///
/// Continuation lines (leading space or tab) extend the previous field; in
/// descriptions a lone `.` marks an empty line.
///
/// # Examples
///
/// ```
/// use slice_index_scan::parse_packages;
///
/// let text = "Package: hello\nSection: devel\nDescription: example package\n long text\n .\n more\n";
/// let records = parse_packages(text);
/// assert_eq!(records[0].package, "hello");
/// assert_eq!(records[0].section.as_deref(), Some("devel"));
/// assert_eq!(
///     records[0].description.as_deref(),
///     Some("example package\nlong text\n\nmore")
/// );
/// ```
pub fn parse_packages(text: &str) -> Vec<PackageRecord> {
    let mut records = Vec::new();
    let mut fields: Vec<(String, String)> = Vec::new();

    let mut flush = |fields: &mut Vec<(String, String)>| {
        if let Some(record) = record_from_fields(fields) {
            records.push(record);
        }
        fields.clear();
    };

    for line in text.lines() {
        if line.trim().is_empty() {
            flush(&mut fields);
            continue;
        }
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some((_, value)) = fields.last_mut() {
                let continuation = line[1..].trim_end();
                value.push('\n');
                if continuation != "." {
                    value.push_str(continuation);
                }
            }
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            fields.push((key.trim().to_string(), value.trim().to_string()));
        }
    }
    flush(&mut fields);

    records
}

fn record_from_fields(fields: &[(String, String)]) -> Option<PackageRecord> {
    let get = |name: &str| {
        fields
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone())
    };
    let package = get("Package").filter(|p| !p.is_empty())?;
    Some(PackageRecord {
        package,
        description: get("Description").filter(|d| !d.trim().is_empty()),
        section: get("Section").filter(|s| !s.is_empty()),
    })
}

/// Package lookup table for one branch, plus the warnings produced while
/// building it.
#[derive(Debug, Clone, Default)]
pub struct BranchPackages {
    pub packages: HashMap<String, PackageInfo>,
    pub warnings: Vec<String>,
}

/// Reads every component × pocket index for one release series.
///
/// Components are the outer loop and pockets the inner one; the first entry
/// seen for a package is kept.
pub fn collect_branch_packages(
    source: &dyn PackageIndexSource,
    branch: &str,
    series: &str,
    components: &[String],
    pockets: &[String],
    arch: &str,
    retry: &RetryConfig,
) -> BranchPackages {
    let mut result = BranchPackages::default();

    for component in components {
        for pocket in pockets {
            let suite = suite_name(series, pocket);
            let label = format!("{suite}/{component}/binary-{arch}");
            let fetched = retry.run(&format!("fetch {label}"), || {
                source.fetch_index(&suite, component, arch)
            });

            let text = match fetched {
                Ok(Some(text)) => text,
                Ok(None) => {
                    warn!(branch, index = %label, "package index not found");
                    result
                        .warnings
                        .push(format!("{branch}: package index {label} not found"));
                    continue;
                }
                Err(err) => {
                    warn!(branch, index = %label, error = %err, "package index unavailable");
                    result
                        .warnings
                        .push(format!("{branch}: package index {label} unavailable: {err}"));
                    continue;
                }
            };

            let records = parse_packages(&text);
            debug!(branch, index = %label, packages = records.len(), "read package index");
            for record in records {
                result
                    .packages
                    .entry(record.package)
                    .or_insert_with(|| PackageInfo {
                        description: record.description,
                        section: record.section,
                        component: component.clone(),
                        repo: pocket.clone(),
                    });
            }
        }
    }

    result
}

fn gunzip(bytes: &[u8], label: &str) -> Result<String, FetchError> {
    let mut decoder = GzDecoder::new(bytes);
    let mut text = String::new();
    decoder
        .read_to_string(&mut text)
        .map_err(|e| FetchError::Decode(format!("{label}: {e}")))?;
    Ok(text)
}

/// Reads indexes from a local mirror laid out like the archive:
/// `<root>/dists/<suite>/<component>/binary-<arch>/Packages(.gz)`.
#[derive(Debug, Clone)]
pub struct MirrorSource {
    root: PathBuf,
}

impl MirrorSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl PackageIndexSource for MirrorSource {
    fn describe(&self) -> String {
        format!("mirror at {}", self.root.display())
    }

    fn fetch_index(
        &self,
        suite: &str,
        component: &str,
        arch: &str,
    ) -> Result<Option<String>, FetchError> {
        let dir = self
            .root
            .join("dists")
            .join(suite)
            .join(component)
            .join(format!("binary-{arch}"));

        let gz = dir.join("Packages.gz");
        if gz.is_file() {
            let bytes =
                std::fs::read(&gz).map_err(|e| FetchError::io(format!("reading {}", gz.display()), e))?;
            return gunzip(&bytes, &gz.display().to_string()).map(Some);
        }

        let plain = dir.join("Packages");
        if plain.is_file() {
            let text = std::fs::read_to_string(&plain)
                .map_err(|e| FetchError::io(format!("reading {}", plain.display()), e))?;
            return Ok(Some(text));
        }

        Ok(None)
    }
}

#[cfg(feature = "archive")]
pub use archive::ArchiveSource;

#[cfg(feature = "archive")]
mod archive {
    use std::time::Duration;

    use reqwest::StatusCode;
    use reqwest::blocking::Client;
    use tracing::debug;

    use super::{PackageIndexSource, gunzip};
    use crate::error::FetchError;

    /// Downloads gzip indexes over HTTP, trying each base URL in order.
    ///
    /// A 404 moves on to the next base (end-of-life releases live on
    /// old-releases); any other failure is reported.
    #[derive(Debug, Clone)]
    pub struct ArchiveSource {
        client: Client,
        base_urls: Vec<String>,
    }

    impl ArchiveSource {
        pub fn new(base_urls: Vec<String>, timeout: Duration) -> Result<Self, FetchError> {
            let client = Client::builder()
                .timeout(timeout)
                .user_agent(concat!("slice-index/", env!("CARGO_PKG_VERSION")))
                .build()
                .map_err(|e| FetchError::Http(e.to_string()))?;
            Ok(Self { client, base_urls })
        }
    }

    impl PackageIndexSource for ArchiveSource {
        fn describe(&self) -> String {
            self.base_urls.join(", ")
        }

        fn fetch_index(
            &self,
            suite: &str,
            component: &str,
            arch: &str,
        ) -> Result<Option<String>, FetchError> {
            for base in &self.base_urls {
                let url = format!(
                    "{}/dists/{suite}/{component}/binary-{arch}/Packages.gz",
                    base.trim_end_matches('/')
                );
                let response = self
                    .client
                    .get(&url)
                    .send()
                    .map_err(|e| FetchError::Http(format!("{url}: {e}")))?;

                match response.status() {
                    StatusCode::OK => {
                        let bytes = response
                            .bytes()
                            .map_err(|e| FetchError::Http(format!("{url}: {e}")))?;
                        return gunzip(&bytes, &url).map(Some);
                    }
                    StatusCode::NOT_FOUND => {
                        debug!(url = %url, "index not on this archive");
                    }
                    status => return Err(FetchError::Http(format!("{url}: HTTP {status}"))),
                }
            }
            Ok(None)
        }
    }
}
