//! Fixed-size worker pools on top of rayon

use super::registry::{Outstanding, PoolKind, TaskRegistry};
use super::task::TaskHandle;
use crate::{Error, Result};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error};

/// Fatal task failures collected during a run, in the order they happened
#[derive(Debug, Default)]
pub(crate) struct Failures(Mutex<Vec<Error>>);

impl Failures {
    pub(crate) fn record(&self, err: Error) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(err);
    }

    pub(crate) fn take(&self) -> Vec<Error> {
        std::mem::take(&mut *self.0.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// One worker pool and the registry of tasks submitted to it
pub(crate) struct Pool {
    threads: ThreadPool,
    registry: Arc<TaskRegistry>,
    failures: Arc<Failures>,
}

impl Pool {
    /// Start a pool with `workers` threads (0 = one per CPU)
    pub(crate) fn new(
        kind: PoolKind,
        workers: usize,
        outstanding: &Arc<Outstanding>,
        failures: &Arc<Failures>,
    ) -> Result<Self> {
        let threads = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(move |i| format!("{}-{}", kind.name(), i))
            .build()?;
        debug!(
            pool = kind.name(),
            threads = threads.current_num_threads(),
            "Worker pool started"
        );

        Ok(Self {
            threads,
            registry: TaskRegistry::new(kind, Arc::clone(outstanding)),
            failures: Arc::clone(failures),
        })
    }

    pub(crate) fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// Queue `job` without waiting for it.
    ///
    /// The task stays registered until `job` has returned and dropped
    /// everything it captured. Errors and panics are recorded as run
    /// failures.
    pub(crate) fn submit<F>(&self, job: F) -> TaskHandle
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let guard = self.registry.register();
        let handle = guard.handle();
        let failures = Arc::clone(&self.failures);
        let pool = self.registry.pool();

        self.threads.spawn(move || {
            match panic::catch_unwind(AssertUnwindSafe(job)) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    error!(pool = pool.name(), "Task failed: {}", err);
                    failures.record(err);
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!(pool = pool.name(), "Task panicked: {}", message);
                    failures.record(Error::TaskPanicked(message));
                }
            }
            drop(guard);
        });

        handle
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
