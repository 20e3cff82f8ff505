//! Units of work scheduled on the worker pools

use crate::archive::{ArchiveEntry, ArchiveKind, ArchiveReader};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Enumerate one archive and fan its entries out as [`FileTask`]s
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveTask {
    /// Archive on disk
    pub source: PathBuf,
    /// Detected format
    pub kind: ArchiveKind,
    /// Whether archives found among the entries are extracted too
    pub recursive: bool,
}

/// Extract one entry of an enumerated archive
pub struct FileTask {
    /// Reader shared by every entry of the archive
    pub reader: Arc<dyn ArchiveReader>,
    /// Entry as it was listed when the archive was enumerated
    pub entry: ArchiveEntry,
    /// Extraction folder of the archive
    pub destination: PathBuf,
    /// Format of the owning archive
    pub kind: ArchiveKind,
    /// Inherited from the [`ArchiveTask`] that produced this task
    pub recursive: bool,
}

/// Completion query for a submitted task.
///
/// A handle never carries a result: tasks report through log lines,
/// files on disk and the tasks they submit.
#[derive(Debug, Clone, Default)]
pub struct TaskHandle {
    finished: Arc<AtomicBool>,
}

impl TaskHandle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Whether the task has run to completion, successfully or not
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    pub(crate) fn mark_finished(&self) {
        self.finished.store(true, Ordering::Release);
    }
}
