//! Indexer configuration.
//!
//! Loaded from a YAML file passed with `--config`. Every field is optional;
//! missing fields take the defaults below, and command-line flags override
//! whatever the file says.
//!
//! # Example YAML
//!
//! ```yaml
//! repository:
//!   url: https://github.com/canonical/chisel-releases
//!   path: data
//!   branch_prefix: ubuntu-
//!   slices_dir: slices
//! distro_info: /usr/share/distro-info/ubuntu.csv
//! jobs: 8
//! retry:
//!   max_attempts: 4
//!   base_delay_ms: 200
//!   max_delay_ms: 5000
//! io_timeout_secs: 120
//! lint:
//!   large_comment_lines: 10
//!   max_blank_lines: 2
//! descriptions:
//!   source: mirror
//!   mirror_dir: /srv/ubuntu-mirror
//!   components: [main, universe]
//!   pockets: [release, updates]
//!   architecture: amd64
//! ```

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use slice_index_lint::LintConfig;

use crate::error::{Result, ScanError};
use crate::retry::RetryConfig;

/// Where the release repository lives and how its branches are laid out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Remote URL to clone from.
    pub url: String,
    /// Local clone (git source) or branch root (directory source).
    pub path: PathBuf,
    /// Only branches starting with this prefix are indexed.
    pub branch_prefix: String,
    /// Directory holding the slice definitions on each branch.
    pub slices_dir: String,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            url: "https://github.com/canonical/chisel-releases".to_string(),
            path: PathBuf::from("data"),
            branch_prefix: "ubuntu-".to_string(),
            slices_dir: "slices".to_string(),
        }
    }
}

/// Retry settings in file-friendly units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 200,
            max_delay_ms: 5000,
        }
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
        }
    }
}

/// Where package descriptions and archive placement come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptionSource {
    /// Download `Packages` indexes from the Ubuntu archive.
    Archive,
    /// Read `Packages` indexes from a local mirror.
    Mirror,
    /// No descriptions; archive columns stay null.
    #[default]
    None,
}

impl std::str::FromStr for DescriptionSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "archive" => Ok(Self::Archive),
            "mirror" => Ok(Self::Mirror),
            "none" => Ok(Self::None),
            other => Err(format!(
                "unknown description source '{other}' (expected archive, mirror or none)"
            )),
        }
    }
}

/// Package index settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DescriptionsConfig {
    pub source: DescriptionSource,
    /// Root of a local mirror (`dists/<suite>/...` below it).
    pub mirror_dir: Option<PathBuf>,
    /// Archive base URLs, tried in order.
    pub archive_urls: Vec<String>,
    /// Components, in lookup order.
    pub components: Vec<String>,
    /// Pockets, in lookup order; `release` is the bare suite.
    pub pockets: Vec<String>,
    pub architecture: String,
}

impl Default for DescriptionsConfig {
    fn default() -> Self {
        Self {
            source: DescriptionSource::None,
            mirror_dir: None,
            archive_urls: vec![
                "https://archive.ubuntu.com/ubuntu".to_string(),
                "https://old-releases.ubuntu.com/ubuntu".to_string(),
            ],
            components: ["main", "restricted", "universe", "multiverse"]
                .map(String::from)
                .to_vec(),
            pockets: ["release", "security", "updates", "backports"]
                .map(String::from)
                .to_vec(),
            architecture: "amd64".to_string(),
        }
    }
}

/// Top-level indexer configuration.
///
/// # Examples
///
/// ```
/// use slice_index_scan::IndexConfig;
///
/// let config = IndexConfig::from_yaml("jobs: 4\nrepository:\n  branch_prefix: ubuntu-2\n").unwrap();
/// assert_eq!(config.jobs, Some(4));
/// assert_eq!(config.repository.branch_prefix, "ubuntu-2");
/// assert_eq!(config.repository.slices_dir, "slices");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub repository: RepositoryConfig,
    /// distro-info CSV with the release calendar.
    pub distro_info: PathBuf,
    /// Worker count; `None` lets the pool pick.
    pub jobs: Option<usize>,
    pub retry: RetrySettings,
    /// Per-operation timeout for git calls and downloads.
    pub io_timeout_secs: u64,
    pub lint: LintConfig,
    pub descriptions: DescriptionsConfig,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            repository: RepositoryConfig::default(),
            distro_info: PathBuf::from("/usr/share/distro-info/ubuntu.csv"),
            jobs: None,
            retry: RetrySettings::default(),
            io_timeout_secs: 120,
            lint: LintConfig::default(),
            descriptions: DescriptionsConfig::default(),
        }
    }
}

impl IndexConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Io`] if the file cannot be read,
    /// [`ScanError::Yaml`] if parsing fails and [`ScanError::Config`] if the
    /// values are inconsistent.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config: Self = serde_yaml::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses configuration from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// Checks values serde cannot.
    pub fn validate(&self) -> Result<()> {
        if self.jobs == Some(0) {
            return Err(ScanError::Config("jobs must be positive".to_string()));
        }
        if self.io_timeout_secs == 0 {
            return Err(ScanError::Config(
                "io_timeout_secs must be positive".to_string(),
            ));
        }
        if self.repository.slices_dir.trim().is_empty() {
            return Err(ScanError::Config("slices_dir cannot be empty".to_string()));
        }
        if self.descriptions.source == DescriptionSource::Mirror
            && self.descriptions.mirror_dir.is_none()
        {
            return Err(ScanError::Config(
                "descriptions.source is mirror but mirror_dir is not set".to_string(),
            ));
        }
        if self.descriptions.source == DescriptionSource::Archive
            && self.descriptions.archive_urls.is_empty()
        {
            return Err(ScanError::Config(
                "descriptions.source is archive but archive_urls is empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::from(&self.retry)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs)
    }
}
