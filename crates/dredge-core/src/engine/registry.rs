//! Outstanding-task accounting for the archive and file pools
//!
//! Every submission registers with the registry of its pool before it is
//! queued. The registry keeps the task's [`TaskHandle`], and the returned
//! [`TaskGuard`] marks it finished and releases it once the task is done.
//! Both registries feed one [`Outstanding`] counter. A task submits its
//! children while it still holds its own guard, so the
//! counter can only reach zero when no task is queued, running, or about
//! to be submitted.

use super::task::TaskHandle;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};

/// Which of the two pools a task runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolKind {
    Archive,
    File,
}

impl PoolKind {
    pub fn name(&self) -> &'static str {
        match self {
            PoolKind::Archive => "archive",
            PoolKind::File => "file",
        }
    }
}

/// Number of tasks, across both pools, that have not finished yet
#[derive(Debug, Default)]
pub struct Outstanding {
    count: Mutex<usize>,
    idle: Condvar,
}

impl Outstanding {
    fn acquire(&self) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        *count += 1;
    }

    fn release(&self) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }

    /// Current number of unfinished tasks
    pub fn current(&self) -> usize {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until every registered task has finished
    pub fn wait_idle(&self) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        while *count > 0 {
            count = self.idle.wait(count).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Registries prune themselves once they hold this many handles
const MIN_PRUNE_AT: usize = 256;

#[derive(Debug)]
struct Handles {
    live: Vec<TaskHandle>,
    prune_at: usize,
}

impl Handles {
    fn prune(&mut self) -> usize {
        self.live.retain(|handle| !handle.is_finished());
        self.prune_at = (self.live.len() * 2).max(MIN_PRUNE_AT);
        self.live.len()
    }
}

/// Handles and submission counts of one pool
#[derive(Debug)]
pub struct TaskRegistry {
    pool: PoolKind,
    handles: Mutex<Handles>,
    submitted: AtomicUsize,
    finished: AtomicUsize,
    outstanding: Arc<Outstanding>,
}

impl TaskRegistry {
    pub fn new(pool: PoolKind, outstanding: Arc<Outstanding>) -> Arc<Self> {
        Arc::new(Self {
            pool,
            handles: Mutex::new(Handles {
                live: Vec::new(),
                prune_at: MIN_PRUNE_AT,
            }),
            submitted: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
            outstanding,
        })
    }

    /// Register a task that is about to be queued
    pub(crate) fn register(self: &Arc<Self>) -> TaskGuard {
        self.outstanding.acquire();
        self.submitted.fetch_add(1, Ordering::SeqCst);

        let handle = TaskHandle::new();
        {
            let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
            if handles.live.len() >= handles.prune_at {
                handles.prune();
            }
            handles.live.push(handle.clone());
        }

        TaskGuard {
            registry: Arc::clone(self),
            handle,
        }
    }

    pub fn pool(&self) -> PoolKind {
        self.pool
    }

    /// Tasks ever submitted to this pool
    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }

    /// Tasks of this pool that have finished
    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    /// Drop the handles of finished tasks and return how many remain
    pub fn prune(&self) -> usize {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .prune()
    }

    /// Snapshot of the handles of tasks not yet seen finished
    pub fn handles(&self) -> Vec<TaskHandle> {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .live
            .clone()
    }

    /// Tasks of this pool that are queued or running
    pub fn pending(&self) -> usize {
        self.prune()
    }
}

/// Keeps a task registered until dropped
pub(crate) struct TaskGuard {
    registry: Arc<TaskRegistry>,
    handle: TaskHandle,
}

impl TaskGuard {
    pub(crate) fn handle(&self) -> TaskHandle {
        self.handle.clone()
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.handle.mark_finished();
        self.registry.finished.fetch_add(1, Ordering::SeqCst);
        self.registry.outstanding.release();
    }
}
