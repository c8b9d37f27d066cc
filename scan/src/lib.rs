//! Fetching and indexing of chisel release branches.
//!
//! - [`enumerate_branches`] lists release branches and attaches lifecycle
//!   flags from the [`ReleaseCalendar`].
//! - [`ReleaseRepository`] fetches definition files per branch, from a git
//!   clone ([`GitRepository`]) or plain directories ([`DirectoryRepository`]).
//! - [`PackageIndexSource`] supplies Debian `Packages` indexes for
//!   descriptions and archive placement.
//! - [`Pipeline`] runs everything in parallel and assembles a
//!   [`Snapshot`](slice_index_core::Snapshot).
//!
//! Transient I/O failures are retried with [`RetryConfig`]; what still fails
//! is contained at file or branch level and recorded in the snapshot.
//!
//! # Example
//!
//! ```no_run
//! use slice_index_scan::{DirectoryRepository, IndexConfig, Pipeline, ReleaseCalendar};
//!
//! let config = IndexConfig::default();
//! let repo = DirectoryRepository::new("fixtures/releases", "slices");
//! let snapshot = Pipeline::from_config(&config, Box::new(repo))
//!     .with_calendar(ReleaseCalendar::load(&config.distro_info)?)
//!     .run()?;
//! println!("{} definitions", snapshot.definitions.len());
//! # Ok::<(), slice_index_scan::ScanError>(())
//! ```

mod branches;
mod calendar;
mod config;
mod descriptions;
mod error;
mod fetch;
mod git;
mod pipeline;
mod repository;
mod retry;

pub use branches::{BranchList, enumerate_branches};
pub use calendar::{ReleaseCalendar, ReleaseInfo};
pub use config::{
    DescriptionSource, DescriptionsConfig, IndexConfig, RepositoryConfig, RetrySettings,
};
#[cfg(feature = "archive")]
pub use descriptions::ArchiveSource;
pub use descriptions::{
    BranchPackages, MirrorSource, PackageIndexSource, PackageInfo, PackageRecord, RELEASE_POCKET,
    collect_branch_packages, parse_packages, suite_name,
};
pub use error::{FetchError, Result, ScanError};
pub use fetch::{SyncAction, sync_repository};
pub use pipeline::{PackageIndexSettings, Pipeline, default_parallel_jobs};
pub use repository::{DirectoryRepository, GitRepository, ReleaseRepository, is_definition_path};
pub use retry::RetryConfig;
