//! The extraction engine
//!
//! A run uses two worker pools. Archive tasks enumerate one archive each
//! and fan its entries out to the file pool. File tasks extract one entry
//! each and, when recursion is on, feed archives they uncover back into
//! the archive pool. The driver in [`Engine::run`] blocks until no task
//! of either kind is outstanding, then shuts both pools down.
//!
//! ```text
//! walker ──► archive pool ──► file pool ──► disk
//!                 ▲                │
//!                 └── nested ──────┘
//! ```

pub mod registry;
pub mod task;

mod pool;
mod walker;
mod worker;

pub use registry::{Outstanding, PoolKind, TaskRegistry};
pub use task::{ArchiveTask, FileTask, TaskHandle};
pub use worker::destination_folder;

use crate::archive::{ArchiveKind, ArchiveOpener, StandardOpener};
use crate::config::{self, Config, DEFAULT_SUFFIX};
use crate::{Error, Result};
use pool::{Failures, Pool};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Callback receiving [`RunEvent`]s from worker threads
pub type Observer = Arc<dyn Fn(&RunEvent) + Send + Sync>;

/// Runtime options for a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Extract archives found inside extracted archives
    pub recursive: bool,
    /// Appended to an archive path to name its extraction folder
    pub suffix: String,
    /// Archive pool size (0 = one per CPU)
    pub archive_workers: usize,
    /// File pool size (0 = one per CPU)
    pub file_workers: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            recursive: false,
            suffix: DEFAULT_SUFFIX.to_string(),
            archive_workers: 0,
            file_workers: 0,
        }
    }
}

impl From<&Config> for EngineOptions {
    fn from(config: &Config) -> Self {
        Self {
            recursive: config.extract.recursive,
            suffix: config.extract.suffix.clone(),
            archive_workers: config.performance.archive_workers,
            file_workers: config.performance.file_workers,
        }
    }
}

/// Something observable that happened while a file task ran
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    /// An entry was written to `path`
    Extracted { path: PathBuf },
    /// An extracted entry is itself an archive and has been queued
    NestedArchive { kind: ArchiveKind, path: PathBuf },
    /// The entry for `path` vanished between enumeration and extraction
    MissingSource { path: PathBuf, reason: String },
    /// The entry for `path` was listed but is of a kind that is not written
    Skipped { path: PathBuf, reason: String },
}

/// Summary of a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Archives that were enumerated
    pub archives: usize,
    /// Entries written to disk
    pub entries_extracted: usize,
    /// Entries of a kind that is not written, such as hard links
    pub entries_skipped: usize,
    /// Archives discovered among extracted entries
    pub nested_archives: usize,
    /// Targets skipped because their source vanished
    pub missing_sources: Vec<PathBuf>,
    /// Tasks submitted to the archive pool
    pub archive_tasks: usize,
    /// Tasks submitted to the file pool
    pub file_tasks: usize,
}

#[derive(Debug, Default)]
struct RunStats {
    archives: AtomicUsize,
    extracted: AtomicUsize,
    skipped: AtomicUsize,
    nested: AtomicUsize,
    missing: Mutex<Vec<PathBuf>>,
}

impl RunStats {
    fn archive_enumerated(&self) {
        self.archives.fetch_add(1, Ordering::Relaxed);
    }

    fn entry_extracted(&self) {
        self.extracted.fetch_add(1, Ordering::Relaxed);
    }

    fn entry_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    fn nested_found(&self) {
        self.nested.fetch_add(1, Ordering::Relaxed);
    }

    fn missing_source(&self, path: PathBuf) {
        self.missing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path);
    }
}

/// State shared by every task of one run
pub(crate) struct Shared {
    options: EngineOptions,
    opener: Arc<dyn ArchiveOpener>,
    observer: Option<Observer>,
    archive_pool: Pool,
    file_pool: Pool,
    stats: RunStats,
}

impl Shared {
    fn submit_archive(self: &Arc<Self>, task: ArchiveTask) {
        let shared = Arc::clone(self);
        self.archive_pool
            .submit(move || worker::process_archive(&shared, task));
    }

    fn submit_file(self: &Arc<Self>, task: FileTask) {
        let shared = Arc::clone(self);
        self.file_pool
            .submit(move || worker::process_file(&shared, task));
    }

    /// Unfinished handles left in either registry
    fn prune(&self) -> usize {
        self.archive_pool.registry().prune() + self.file_pool.registry().prune()
    }

    fn emit(&self, event: RunEvent) {
        if let Some(observer) = &self.observer {
            observer(&event);
        }
    }

    fn report(&self) -> RunReport {
        let mut missing_sources = self
            .stats
            .missing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        missing_sources.sort();

        RunReport {
            archives: self.stats.archives.load(Ordering::SeqCst),
            entries_extracted: self.stats.extracted.load(Ordering::SeqCst),
            entries_skipped: self.stats.skipped.load(Ordering::SeqCst),
            nested_archives: self.stats.nested.load(Ordering::SeqCst),
            missing_sources,
            archive_tasks: self.archive_pool.registry().submitted(),
            file_tasks: self.file_pool.registry().submitted(),
        }
    }
}

/// Finds and extracts every archive under a directory
pub struct Engine {
    options: EngineOptions,
    opener: Arc<dyn ArchiveOpener>,
    observer: Option<Observer>,
}

impl Engine {
    /// Create an engine using the built-in zip and tar readers
    pub fn new(options: EngineOptions) -> Self {
        Self {
            options,
            opener: Arc::new(StandardOpener),
            observer: None,
        }
    }

    /// Replace the way archives are opened
    pub fn with_opener(mut self, opener: Arc<dyn ArchiveOpener>) -> Self {
        self.opener = opener;
        self
    }

    /// Receive an event for every extracted, skipped, nested or vanished
    /// entry.
    ///
    /// The callback runs on worker threads.
    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(&RunEvent) + Send + Sync + 'static,
    {
        self.observer = Some(Arc::new(observer));
        self
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Extract every archive under `root`, and with recursion every
    /// archive they contain, then return once all work has finished.
    ///
    /// Work already queued is always drained before returning, even when
    /// a task has failed. Any task failure fails the whole run with
    /// [`Error::TaskFailures`].
    pub fn run(&self, root: &Path) -> Result<RunReport> {
        config::validate_suffix(&self.options.suffix)?;

        let root = root.canonicalize()?;
        if !root.is_dir() {
            return Err(Error::InvalidPath(format!(
                "Not a directory: {}",
                root.display()
            )));
        }

        let outstanding = Arc::new(Outstanding::default());
        let failures = Arc::new(Failures::default());
        let shared = Arc::new(Shared {
            options: self.options.clone(),
            opener: Arc::clone(&self.opener),
            observer: self.observer.clone(),
            archive_pool: Pool::new(
                PoolKind::Archive,
                self.options.archive_workers,
                &outstanding,
                &failures,
            )?,
            file_pool: Pool::new(
                PoolKind::File,
                self.options.file_workers,
                &outstanding,
                &failures,
            )?,
            stats: RunStats::default(),
        });

        debug!(
            recursive = self.options.recursive,
            "Extracting archives under {}",
            root.display()
        );
        let walked = walker::submit_archives(&shared, &root);

        // Quiescent once nothing is queued or running in either pool, as
        // confirmed by a fresh look at both registries
        loop {
            outstanding.wait_idle();
            let remaining = shared.prune();
            if remaining == 0 {
                break;
            }
            debug!(remaining, "Registries still hold unfinished tasks");
        }
        let report = shared.report();
        drop(shared);
        debug!(
            archive_tasks = report.archive_tasks,
            file_tasks = report.file_tasks,
            "Worker pools shut down"
        );

        let top_level = walked?;
        debug!(top_level, "All archives processed");

        let mut failures = failures.take();
        if !failures.is_empty() {
            let count = failures.len();
            return Err(Error::TaskFailures {
                count,
                first: Box::new(failures.remove(0)),
            });
        }

        Ok(report)
    }
}

/// Run an [`Engine`] with `options` over `root`
pub fn extract_tree(root: &Path, options: EngineOptions) -> Result<RunReport> {
    Engine::new(options).run(root)
}
