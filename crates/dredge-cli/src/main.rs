//! dredge - Recursively find and extract every archive under a directory
//!
//! Each archive is extracted into a sibling folder named after it. With
//! `--recursive`, archives found among the extracted files are extracted
//! as well, until no new archive turns up.

use anyhow::{Context, Result};
use clap::Parser;
use dredge_core::{Config, Engine, EngineOptions};
use std::path::PathBuf;
use std::process;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod progress;

use progress::ProgressReporter;

/// dredge - Recursively find and extract archives
///
/// Every zip and tar archive (plain, gzip, xz or zstd) under DIR is
/// extracted next to itself into `<archive><suffix>`.
#[derive(Parser, Debug)]
#[command(name = "dredge")]
#[command(author, version, about = "Recursively find and extract archives", long_about = None)]
struct Cli {
    /// Directory to search for archives
    #[arg(short, long, visible_alias = "directory")]
    dir: PathBuf,

    /// Also extract archives found inside extracted archives
    #[arg(short, long)]
    recursive: bool,

    /// Suffix appended to an archive's path to name its extraction folder
    #[arg(long)]
    suffix: Option<String>,

    /// Threads enumerating archives (0 = one per CPU)
    #[arg(long)]
    archive_workers: Option<usize>,

    /// Threads extracting entries (0 = one per CPU)
    #[arg(long)]
    file_workers: Option<usize>,

    /// Configuration file to use instead of the default location
    #[arg(long, env = "DREDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Print a JSON summary of the run to stdout
    #[arg(long)]
    json: bool,

    /// Enable verbose output for debugging
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Show a progress spinner while extracting
    #[arg(long)]
    progress: bool,
}

impl Cli {
    /// Engine options from the config file, overridden by flags
    fn engine_options(&self, config: &Config) -> EngineOptions {
        let mut options = EngineOptions::from(config);
        if self.recursive {
            options.recursive = true;
        }
        if let Some(suffix) = &self.suffix {
            options.suffix = suffix.clone();
        }
        if let Some(workers) = self.archive_workers {
            options.archive_workers = workers;
        }
        if let Some(workers) = self.file_workers {
            options.file_workers = workers;
        }
        options
    }
}

fn setup_logging(verbose: bool, quiet: bool) {
    if quiet {
        return;
    }

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(verbose)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    match run() {
        Ok(()) => process::exit(0),
        Err(e) => {
            eprintln!("Error: {:?}", e);
            process::exit(map_error_to_exit_code(&e));
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load_or_default(),
    };
    let options = cli.engine_options(&config);
    debug!(?options, "Resolved options");

    let reporter = ProgressReporter::new(cli.progress && !cli.quiet);
    let mut engine = Engine::new(options);
    if let Some(bar) = reporter.handle() {
        engine = engine.with_observer(move |event| progress::observe(&bar, event));
    }

    let report = engine
        .run(&cli.dir)
        .with_context(|| format!("Failed to extract archives under {}", cli.dir.display()))?;

    reporter.finish("Extraction complete");
    debug!(
        "Extracted {} entries from {} archives ({} nested), skipped {}",
        report.entries_extracted, report.archives, report.nested_archives, report.entries_skipped
    );

    if cli.json {
        let json = serde_json::to_string_pretty(&report)?;
        println!("{}", json);
    }

    Ok(())
}

/// Map errors to exit codes:
/// - 0: Success
/// - 1: General, config or task error
/// - 2: IO error
/// - 3: Invalid path or existing destination
/// - 4: Archive format error
fn map_error_to_exit_code(err: &anyhow::Error) -> i32 {
    if let Some(dredge_err) = err.downcast_ref::<dredge_core::Error>() {
        match dredge_err.root() {
            dredge_core::Error::Io(_) => 2,
            dredge_core::Error::InvalidPath(_) => 3,
            dredge_core::Error::DestinationExists(_) => 3,
            dredge_core::Error::Archive(_) => 4,
            dredge_core::Error::Zip(_) => 4,
            dredge_core::Error::MissingSource { .. } => 2,
            dredge_core::Error::Config(_) => 1,
            dredge_core::Error::ThreadPool(_) => 1,
            dredge_core::Error::TaskPanicked(_) => 1,
            dredge_core::Error::TaskFailures { .. } => 1,
        }
    } else if err.is::<std::io::Error>() {
        2
    } else {
        1
    }
}
