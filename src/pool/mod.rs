// src/pool/mod.rs

//! Worker pools the run engine dispatches jobs through.
//!
//! The engine only ever talks to a [`WorkerPool`]. Two backends implement
//! it and exactly one is chosen per run (see [`PoolBackend`]):
//!
//! - [`ThreadedWorkerPool`]: local jobs on the multi-thread runtime, bounded
//!   by a semaphore.
//! - [`CooperativeWorkerPool`]: many outstanding cluster submissions kept
//!   alive on a single OS thread. Must be driven from inside a
//!   `tokio::task::LocalSet`.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::debug;

use crate::config::model::ConfigSection;
use crate::errors::Result;

pub mod cooperative;
pub mod threaded;

pub use cooperative::CooperativeWorkerPool;
pub use threaded::ThreadedWorkerPool;

/// Smallest size a cooperative pool ever reports.
///
/// Callers that poll `size()` to decide whether to keep waiting must not
/// read an idle cooperative pool as a finished one.
pub const MIN_REPORTED_SIZE: usize = 1;

/// Default number of outstanding cluster jobs.
pub const DEFAULT_CLUSTER_JOBS: usize = 40;

/// A unit of work: one job, already bound to everything it needs.
pub type Unit = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'static>>;

/// Identity of a submitted unit, handed back with its outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobRef {
    pub task: String,
    pub label: String,
}

impl JobRef {
    pub fn new(task: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            label: label.into(),
        }
    }
}

#[derive(Debug)]
pub struct UnitOutcome {
    pub job: JobRef,
    pub result: anyhow::Result<()>,
}

/// The contract the run engine drives.
pub trait WorkerPool {
    /// Number of outstanding units, as reported to callers.
    fn size(&self) -> usize;

    /// Stop accepting new units.
    fn close(&mut self);

    /// Abort every outstanding unit.
    fn terminate(&mut self);

    fn submit(&mut self, job: JobRef, unit: Unit) -> Result<()>;

    /// Wait for the next finished unit.
    ///
    /// Returns `None` when nothing is outstanding, or when a backend that
    /// honours `timeout` gives up waiting.
    fn next_with_timeout(
        &mut self,
        timeout: Option<Duration>,
    ) -> Pin<Box<dyn Future<Output = Option<UnitOutcome>> + '_>>;
}

/// Which pool a run uses. Chosen once, at start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolBackend {
    Threaded { workers: usize },
    Cooperative { max_outstanding: usize },
}

impl PoolBackend {
    pub fn select(config: &ConfigSection) -> Self {
        let backend = if config.without_cluster {
            PoolBackend::Threaded {
                workers: config.multiprocess.unwrap_or_else(default_local_workers),
            }
        } else {
            PoolBackend::Cooperative {
                max_outstanding: config.multiprocess.unwrap_or(DEFAULT_CLUSTER_JOBS),
            }
        };
        debug!(?backend, "worker pool backend selected");
        backend
    }

    /// Maximum number of units the engine keeps outstanding.
    pub fn concurrency(&self) -> usize {
        match *self {
            PoolBackend::Threaded { workers } => workers,
            PoolBackend::Cooperative { max_outstanding } => max_outstanding,
        }
    }

    pub fn is_cooperative(&self) -> bool {
        matches!(self, PoolBackend::Cooperative { .. })
    }

    pub fn build(&self) -> Box<dyn WorkerPool> {
        match *self {
            PoolBackend::Threaded { workers } => Box::new(ThreadedWorkerPool::new(workers)),
            PoolBackend::Cooperative { .. } => Box::new(CooperativeWorkerPool::new()),
        }
    }
}

/// Half the available CPUs, rounded up.
pub fn default_local_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .div_ceil(2)
}

/// Turn a failed join into the unit's error.
pub(crate) fn join_error(err: tokio::task::JoinError) -> anyhow::Error {
    if err.is_cancelled() {
        anyhow::anyhow!("job was cancelled")
    } else {
        anyhow::anyhow!("job panicked: {err}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_follows_cluster_flag() {
        let local = ConfigSection {
            without_cluster: true,
            multiprocess: Some(3),
            ..ConfigSection::default()
        };
        assert_eq!(PoolBackend::select(&local), PoolBackend::Threaded { workers: 3 });

        let cluster = ConfigSection {
            without_cluster: false,
            multiprocess: None,
            ..ConfigSection::default()
        };
        let backend = PoolBackend::select(&cluster);
        assert!(backend.is_cooperative());
        assert_eq!(backend.concurrency(), DEFAULT_CLUSTER_JOBS);
    }

    #[test]
    fn default_workers_is_at_least_one() {
        assert!(default_local_workers() >= 1);
    }
}
