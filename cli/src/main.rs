use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use slice_index_core::{Definition, Finding};
use slice_index_lint::LintEngine;
use slice_index_scan::{
    DescriptionSource, DirectoryRepository, GitRepository, IndexConfig, MirrorSource,
    PackageIndexSource, Pipeline, ReleaseCalendar, ReleaseRepository, SyncAction,
    sync_repository,
};
use slice_index_sqlite::{SnapshotReader, write_snapshot};
use tracing::{info, warn};

const PACKAGE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Where `compile` reads branches from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum CliSource {
    /// Remote-tracking refs of a git clone.
    Git,
    /// One directory per branch.
    Dir,
}

#[derive(Debug, Parser)]
#[command(name = "slice-index")]
#[command(about = "Index chisel slice definitions across Ubuntu release branches")]
#[command(version)]
struct Cli {
    /// Log debug output.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Only log errors.
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Clone or update the release repository.
    Fetch(FetchArgs),
    /// Index every release branch into a snapshot database.
    Compile(CompileArgs),
    /// Parse and lint local slice definition files.
    Lint(LintArgs),
    /// Show statistics and metadata of a snapshot database.
    Info(InfoArgs),
}

/// Options shared by commands that read the release repository.
#[derive(Debug, Args)]
struct RepoArgs {
    /// Path to an index configuration YAML file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Local clone (git) or branch root (dir).
    #[arg(long)]
    repo: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct FetchArgs {
    #[command(flatten)]
    repo: RepoArgs,
    /// Remote URL of the release repository.
    #[arg(long)]
    url: Option<String>,
}

#[derive(Debug, Args)]
struct CompileArgs {
    /// Output database path.
    db_path: PathBuf,
    #[command(flatten)]
    repo: RepoArgs,
    /// Where to read branches from.
    #[arg(long, value_enum, default_value = "git")]
    source: CliSource,
    /// Overwrite an existing database and artifact.
    #[arg(long)]
    force: bool,
    /// Skip writing the compressed artifact.
    #[arg(long)]
    no_compress: bool,
    /// Worker threads; -1 picks one per CPU.
    #[arg(short, long, allow_negative_numbers = true)]
    jobs: Option<i64>,
    /// Package description source: archive, mirror or none.
    #[arg(long)]
    descriptions: Option<DescriptionSource>,
    /// Root of a local archive mirror.
    #[arg(long)]
    mirror_dir: Option<PathBuf>,
    /// distro-info CSV with the Ubuntu release calendar.
    #[arg(long)]
    distro_info: Option<PathBuf>,
    /// Only index branches starting with this prefix.
    #[arg(long)]
    branch_prefix: Option<String>,
}

#[derive(Debug, Args)]
struct LintArgs {
    /// Slice definition files.
    #[arg(required = true)]
    files: Vec<PathBuf>,
    /// Path to an index configuration YAML file (lint thresholds).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Exit with status 2 when any warning is found.
    #[arg(long)]
    strict: bool,
}

#[derive(Debug, Args)]
struct InfoArgs {
    /// Snapshot database path.
    db_path: PathBuf,
    /// Print JSON instead of text.
    #[arg(long)]
    json: bool,
}

fn main() {
    let cli = Cli::parse();

    if let Err(err) = init_tracing(cli.quiet, cli.verbose) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }

    let result = match cli.command {
        Command::Fetch(args) => run_fetch(args),
        Command::Compile(args) => run_compile(args),
        Command::Lint(args) => run_lint(args),
        Command::Info(args) => run_info(args),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}

fn init_tracing(quiet: bool, verbose: bool) -> Result<(), String> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("SLICE_INDEX_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| format!("failed to initialize tracing subscriber: {e}"))
}

fn load_config(path: Option<&Path>) -> Result<IndexConfig, String> {
    match path {
        Some(path) => IndexConfig::load(path)
            .map_err(|e| format!("Failed to load config '{}': {e}", path.display())),
        None => Ok(IndexConfig::default()),
    }
}

fn run_fetch(args: FetchArgs) -> Result<i32, String> {
    let mut config = load_config(args.repo.config.as_deref())?;
    if let Some(repo) = args.repo.repo {
        config.repository.path = repo;
    }
    if let Some(url) = args.url {
        config.repository.url = url;
    }

    let action = sync_repository(
        &config.repository.url,
        &config.repository.path,
        config.io_timeout(),
        &config.retry_config(),
    )
    .map_err(|e| e.to_string())?;

    let verb = match action {
        SyncAction::Cloned => "Cloned",
        SyncAction::Fetched => "Updated",
    };
    println!(
        "{verb} {} in {}",
        config.repository.url,
        config.repository.path.display()
    );
    Ok(0)
}

fn run_compile(args: CompileArgs) -> Result<i32, String> {
    let started = Instant::now();
    let mut config = load_config(args.repo.config.as_deref())?;
    apply_compile_overrides(&mut config, &args)?;
    config.validate().map_err(|e| e.to_string())?;

    if args.db_path.exists() && !args.force {
        return Err(format!(
            "{} already exists (use --force to overwrite)",
            args.db_path.display()
        ));
    }

    let repository: Box<dyn ReleaseRepository> = match args.source {
        CliSource::Git => Box::new(GitRepository::new(
            &config.repository.path,
            config.repository.slices_dir.clone(),
            config.io_timeout(),
        )),
        CliSource::Dir => Box::new(DirectoryRepository::new(
            &config.repository.path,
            config.repository.slices_dir.clone(),
        )),
    };

    let mut pipeline = Pipeline::from_config(&config, repository)
        .with_calendar(load_calendar(&config.distro_info)?)
        .with_tool_version(PACKAGE_VERSION);
    if let Some(source) = package_source(&config)? {
        info!(source = %source.describe(), "reading package indexes");
        pipeline = pipeline.with_package_source(source);
    }

    let snapshot = pipeline.run().map_err(|e| e.to_string())?;
    let report = write_snapshot(&snapshot, &args.db_path, args.force)
        .map_err(|e| format!("Failed to write '{}': {e}", args.db_path.display()))?;

    let (notes, warnings) = snapshot.finding_counts();
    println!(
        "Wrote {}: {} definitions, {} packages, {} releases ({} notes, {} warnings)",
        args.db_path.display(),
        report.slices,
        snapshot.package_count(),
        report.releases,
        notes,
        warnings
    );
    for failure in &snapshot.meta.failed_branches {
        println!("  failed branch {}: {}", failure.branch, failure.error);
    }

    if !args.no_compress {
        let artifact = slice_index_artifact::compress_file(&args.db_path, args.force)
            .map_err(|e| format!("Failed to compress '{}': {e}", args.db_path.display()))?;
        println!(
            "Compressed {} ({} → {} bytes, {:.1}%)",
            artifact.path.display(),
            artifact.input_bytes,
            artifact.output_bytes,
            artifact.ratio() * 100.0
        );
    }

    info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        "compile finished"
    );
    Ok(0)
}

fn apply_compile_overrides(config: &mut IndexConfig, args: &CompileArgs) -> Result<(), String> {
    if let Some(repo) = &args.repo.repo {
        config.repository.path = repo.clone();
    }
    if let Some(prefix) = &args.branch_prefix {
        config.repository.branch_prefix = prefix.clone();
    }
    if let Some(path) = &args.distro_info {
        config.distro_info = path.clone();
    }
    if let Some(source) = args.descriptions {
        config.descriptions.source = source;
    }
    if let Some(dir) = &args.mirror_dir {
        config.descriptions.mirror_dir = Some(dir.clone());
    }
    if let Some(jobs) = args.jobs {
        config.jobs = parse_jobs(jobs)?;
    }
    Ok(())
}

/// `-1` means one worker per CPU.
fn parse_jobs(jobs: i64) -> Result<Option<usize>, String> {
    match jobs {
        -1 => Ok(None),
        n if n > 0 => Ok(Some(n as usize)),
        n => Err(format!("invalid --jobs {n}: expected a positive number or -1")),
    }
}

fn load_calendar(path: &Path) -> Result<ReleaseCalendar, String> {
    if !path.exists() {
        warn!(
            path = %path.display(),
            "release calendar not found, every branch gets default flags"
        );
        return Ok(ReleaseCalendar::empty());
    }
    ReleaseCalendar::load(path)
        .map_err(|e| format!("Failed to load release calendar '{}': {e}", path.display()))
}

fn package_source(config: &IndexConfig) -> Result<Option<Box<dyn PackageIndexSource>>, String> {
    let descriptions = &config.descriptions;
    match descriptions.source {
        DescriptionSource::None => Ok(None),
        DescriptionSource::Mirror => {
            let dir = descriptions
                .mirror_dir
                .as_ref()
                .ok_or("--descriptions mirror requires --mirror-dir")?;
            Ok(Some(Box::new(MirrorSource::new(dir))))
        }
        DescriptionSource::Archive => {
            let source = slice_index_scan::ArchiveSource::new(
                descriptions.archive_urls.clone(),
                config.io_timeout(),
            )
            .map_err(|e| format!("Failed to set up archive client: {e}"))?;
            Ok(Some(Box::new(source)))
        }
    }
}

/// Lint output for one file.
#[derive(Debug, Serialize)]
struct LintReport {
    file: String,
    package: String,
    version: Option<String>,
    findings: Vec<Finding>,
}

fn run_lint(args: LintArgs) -> Result<i32, String> {
    let config = load_config(args.config.as_deref())?;
    let engine = LintEngine::with_defaults(&config.lint);

    let mut reports = Vec::new();
    for file in &args.files {
        let bytes = std::fs::read(file)
            .map_err(|e| format!("Failed to read '{}': {e}", file.display()))?;
        let label = file.to_string_lossy();
        let mut definition = Definition::from_bytes("local", &label, &bytes);
        engine.apply(&mut definition);
        reports.push(LintReport {
            file: label.into_owned(),
            package: definition.package,
            version: definition.version.map(|v| v.as_str().to_string()),
            findings: definition.findings,
        });
    }

    let json = serde_json::to_string_pretty(&reports)
        .map_err(|e| format!("Failed to serialize findings: {e}"))?;
    println!("{json}");

    let has_warnings = reports
        .iter()
        .any(|report| report.findings.iter().any(Finding::is_warning));
    Ok(if args.strict && has_warnings { 2 } else { 0 })
}

fn run_info(args: InfoArgs) -> Result<i32, String> {
    let reader = SnapshotReader::open(&args.db_path)
        .map_err(|e| format!("Failed to open '{}': {e}", args.db_path.display()))?;
    let stats = reader.stats().map_err(|e| e.to_string())?;
    let meta = reader.meta_rows().map_err(|e| e.to_string())?;
    let releases = reader.releases().map_err(|e| e.to_string())?;

    if args.json {
        let meta: BTreeMap<String, String> = meta.into_iter().collect();
        let value = serde_json::json!({
            "meta": meta,
            "stats": stats,
            "releases": releases,
        });
        let json = serde_json::to_string_pretty(&value).map_err(|e| e.to_string())?;
        println!("{json}");
        return Ok(0);
    }

    println!("Snapshot: {}", args.db_path.display());
    for (key, value) in &meta {
        println!("  {key}: {value}");
    }
    println!("Releases:");
    for release in &releases {
        let mut tags = Vec::new();
        if release.lts {
            tags.push("lts");
        }
        if release.supported {
            tags.push("supported");
        }
        if release.devel {
            tags.push("devel");
        }
        println!("  {} [{}]", release.branch, tags.join(", "));
    }
    println!("Rows: {}", stats.rows);
    println!("Packages: {}", stats.packages);
    println!("Descriptions: {}", stats.descriptions);
    println!("Versioned: {}", stats.versioned);
    println!("Unparsed: {}", stats.unparsed);
    println!("With warnings: {}", stats.with_warnings);
    Ok(0)
}
