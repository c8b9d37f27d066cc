//! The parallel indexing pipeline.
//!
//! Branches fan out over a bounded rayon pool; within a branch, files fan out
//! again for fetch, parse and lint. Every worker returns an owned value and
//! the snapshot is built once, after the pool has finished, in
//! [`Snapshot::assemble`]. Nothing shared is mutated by workers.

use std::collections::HashMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use slice_index_core::{
    Branch, BranchFailure, Definition, DescriptionCandidate, Meta, Snapshot, compare_branches,
    merge_descriptions,
};
use slice_index_lint::LintEngine;
use tracing::{debug, error, info, warn};

use crate::branches::enumerate_branches;
use crate::calendar::ReleaseCalendar;
use crate::config::{DescriptionsConfig, IndexConfig};
use crate::descriptions::{PackageIndexSource, PackageInfo, collect_branch_packages};
use crate::error::{FetchError, Result};
use crate::repository::ReleaseRepository;
use crate::retry::RetryConfig;

/// Worker count used when none is configured.
pub fn default_parallel_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|parallelism| parallelism.get())
        .unwrap_or(4)
        .max(1)
}

/// Which package indexes to read for each branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageIndexSettings {
    pub components: Vec<String>,
    pub pockets: Vec<String>,
    pub architecture: String,
}

impl Default for PackageIndexSettings {
    fn default() -> Self {
        let defaults = DescriptionsConfig::default();
        Self {
            components: defaults.components,
            pockets: defaults.pockets,
            architecture: defaults.architecture,
        }
    }
}

/// Runs one indexing pass over a release repository.
pub struct Pipeline {
    repository: Box<dyn ReleaseRepository>,
    lint: LintEngine,
    calendar: ReleaseCalendar,
    packages: Option<Box<dyn PackageIndexSource>>,
    index_settings: PackageIndexSettings,
    branch_prefix: String,
    jobs: Option<usize>,
    retry: RetryConfig,
    tool_version: String,
    now: Option<DateTime<Utc>>,
}

/// Result of indexing one branch.
enum BranchOutcome {
    Indexed {
        branch: Branch,
        definitions: Vec<Definition>,
        candidates: Vec<DescriptionCandidate>,
        warnings: Vec<String>,
    },
    Failed(BranchFailure),
}

impl BranchOutcome {
    fn branch_name(&self) -> &str {
        match self {
            Self::Indexed { branch, .. } => &branch.name,
            Self::Failed(failure) => &failure.branch,
        }
    }
}

impl Pipeline {
    pub fn new(repository: Box<dyn ReleaseRepository>, lint: LintEngine) -> Self {
        Self {
            repository,
            lint,
            calendar: ReleaseCalendar::empty(),
            packages: None,
            index_settings: PackageIndexSettings::default(),
            branch_prefix: "ubuntu-".to_string(),
            jobs: None,
            retry: RetryConfig::default(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            now: None,
        }
    }

    /// Builds a pipeline from configuration.
    ///
    /// The calendar and the package index source involve I/O and are
    /// attached separately.
    pub fn from_config(config: &IndexConfig, repository: Box<dyn ReleaseRepository>) -> Self {
        let descriptions = &config.descriptions;
        let mut pipeline = Self::new(repository, LintEngine::with_defaults(&config.lint))
            .with_branch_prefix(config.repository.branch_prefix.clone())
            .with_retry(config.retry_config());
        pipeline.jobs = config.jobs;
        pipeline.index_settings = PackageIndexSettings {
            components: descriptions.components.clone(),
            pockets: descriptions.pockets.clone(),
            architecture: descriptions.architecture.clone(),
        };
        pipeline
    }

    pub fn with_calendar(mut self, calendar: ReleaseCalendar) -> Self {
        self.calendar = calendar;
        self
    }

    /// Attaches the source of descriptions and archive placement.
    pub fn with_package_source(mut self, source: Box<dyn PackageIndexSource>) -> Self {
        self.packages = Some(source);
        self
    }

    pub fn with_index_settings(mut self, settings: PackageIndexSettings) -> Self {
        self.index_settings = settings;
        self
    }

    pub fn with_branch_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.branch_prefix = prefix.into();
        self
    }

    /// Bounds the worker pool; `None` uses [`default_parallel_jobs`].
    pub fn with_jobs(mut self, jobs: Option<usize>) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_tool_version(mut self, version: impl Into<String>) -> Self {
        self.tool_version = version.into();
        self
    }

    /// Pins the run timestamp, which also fixes "today" for the calendar.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    /// Runs enumeration, indexing and assembly.
    ///
    /// # Errors
    ///
    /// Fails only for run-fatal conditions: the repository cannot be listed,
    /// the worker pool cannot start, or two definitions share a
    /// `(package, branch)` key. Branch and file failures are recorded in the
    /// snapshot instead.
    pub fn run(&self) -> Result<Snapshot> {
        let started = Instant::now();
        let now = self.now.unwrap_or_else(Utc::now);

        let list = enumerate_branches(
            self.repository.as_ref(),
            &self.calendar,
            &self.branch_prefix,
            now.date_naive(),
            &self.retry,
        )?;

        let jobs = self
            .jobs
            .filter(|jobs| *jobs > 0)
            .unwrap_or_else(default_parallel_jobs);
        let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;

        let index_started = Instant::now();
        let mut outcomes: Vec<BranchOutcome> = pool.install(|| {
            list.branches
                .par_iter()
                .map(|branch| self.index_branch(branch))
                .collect()
        });
        // Completion order must not leak into the output.
        outcomes.sort_by(|a, b| compare_branches(a.branch_name(), b.branch_name()));
        info!(
            branches = outcomes.len(),
            jobs,
            elapsed_ms = index_started.elapsed().as_millis() as u64,
            "indexed branches"
        );

        let mut meta = Meta::at(self.tool_version.clone(), now);
        meta.warnings = list.warnings;
        let mut releases = Vec::new();
        let mut definitions = Vec::new();
        let mut candidates = Vec::new();

        for outcome in outcomes {
            match outcome {
                BranchOutcome::Indexed {
                    branch,
                    definitions: defs,
                    candidates: found,
                    warnings,
                } => {
                    releases.push(branch);
                    definitions.extend(defs);
                    candidates.extend(found);
                    meta.warnings.extend(warnings);
                }
                BranchOutcome::Failed(failure) => meta.failed_branches.push(failure),
            }
        }

        let descriptions = merge_descriptions(candidates);
        let snapshot = Snapshot::assemble(meta, releases, definitions, descriptions)?;

        let (notes, warnings) = snapshot.finding_counts();
        info!(
            releases = snapshot.releases.len(),
            failed_branches = snapshot.meta.failed_branches.len(),
            definitions = snapshot.definitions.len(),
            packages = snapshot.package_count(),
            descriptions = snapshot.descriptions.len(),
            notes,
            warnings,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "assembled snapshot"
        );
        Ok(snapshot)
    }

    fn index_branch(&self, branch: &Branch) -> BranchOutcome {
        let started = Instant::now();
        let name = branch.name.as_str();

        let paths = match self.retry.run(&format!("list {name}"), || {
            self.repository.list_definitions(name)
        }) {
            Ok(paths) => paths,
            Err(err) => {
                error!(branch = %name, error = %err, "branch unlistable, skipping");
                return BranchOutcome::Failed(BranchFailure::new(name, err));
            }
        };

        let (files, packages) = rayon::join(
            || {
                paths
                    .par_iter()
                    .map(|path| self.index_file(name, path))
                    .collect::<std::result::Result<Vec<Definition>, FetchError>>()
            },
            || self.load_packages(branch),
        );

        let mut definitions = match files {
            Ok(definitions) => definitions,
            Err(err) => {
                error!(branch = %name, error = %err, "branch failed while reading definitions");
                return BranchOutcome::Failed(BranchFailure::new(name, err));
            }
        };
        let (packages, warnings) = packages;

        let mut candidates = Vec::new();
        for def in &mut definitions {
            let Some(info) = packages.get(&def.package) else {
                continue;
            };
            def.archive.component = Some(info.component.clone());
            def.archive.repo = Some(info.repo.clone());
            def.archive.section = info.section.clone();
            if let Some(text) = &info.description {
                candidates.push(DescriptionCandidate::new(
                    def.package.clone(),
                    name,
                    text.clone(),
                ));
            }
        }

        debug!(
            branch = %name,
            definitions = definitions.len(),
            described = candidates.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "indexed branch"
        );
        BranchOutcome::Indexed {
            branch: branch.clone(),
            definitions,
            candidates,
            warnings,
        }
    }

    /// Fetches, parses and lints one file.
    ///
    /// Only branch-fatal fetch errors are returned; they cancel the rest of
    /// the branch. Anything else becomes a definition with a `parse-error`.
    fn index_file(&self, branch: &str, path: &str) -> std::result::Result<Definition, FetchError> {
        let fetched = self.retry.run(&format!("read {branch}:{path}"), || {
            self.repository.read_definition(branch, path)
        });

        let mut definition = match fetched {
            Ok(bytes) => Definition::from_bytes(branch, path, &bytes),
            Err(err) if err.is_branch_fatal() => return Err(err),
            Err(err) => {
                warn!(branch, path, error = %err, "definition unreadable");
                Definition::unreadable(branch, path, err)
            }
        };
        self.lint.apply(&mut definition);
        Ok(definition)
    }

    fn load_packages(&self, branch: &Branch) -> (HashMap<String, PackageInfo>, Vec<String>) {
        let Some(source) = &self.packages else {
            return (HashMap::new(), Vec::new());
        };
        let Some(series) = branch.codename.as_deref() else {
            return (
                HashMap::new(),
                vec![format!(
                    "{}: unknown release series, package indexes skipped",
                    branch.name
                )],
            );
        };

        let started = Instant::now();
        let result = collect_branch_packages(
            source.as_ref(),
            &branch.name,
            series,
            &self.index_settings.components,
            &self.index_settings.pockets,
            &self.index_settings.architecture,
            &self.retry,
        );
        debug!(
            branch = %branch.name,
            source = %source.describe(),
            packages = result.packages.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "loaded package indexes"
        );
        (result.packages, result.warnings)
    }
}
