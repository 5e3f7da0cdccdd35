// src/pool/cooperative.rs

//! Worker pool over a single-thread cooperative scheduler.
//!
//! Units are spawned onto the current `LocalSet` and only make progress
//! while the thread driving it awaits. They suspend at the cluster
//! session's submission call, which is what lets one thread keep dozens of
//! cluster jobs outstanding at once.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::task::{Id, JoinSet};
use tracing::{debug, warn};

use crate::errors::Result;
use crate::pool::{JobRef, MIN_REPORTED_SIZE, Unit, UnitOutcome, WorkerPool, join_error};

#[derive(Debug, Default)]
pub struct CooperativeWorkerPool {
    set: JoinSet<anyhow::Result<()>>,
    jobs: HashMap<Id, JobRef>,
}

impl CooperativeWorkerPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Actual number of outstanding units, without the reporting floor.
    pub fn outstanding(&self) -> usize {
        self.set.len()
    }
}

impl WorkerPool for CooperativeWorkerPool {
    fn size(&self) -> usize {
        self.set.len().max(MIN_REPORTED_SIZE)
    }

    fn close(&mut self) {}

    fn terminate(&mut self) {
        if !self.set.is_empty() {
            warn!(outstanding = self.set.len(), "terminating cooperative pool");
        }
        self.set.abort_all();
    }

    /// Spawn `unit` on the current `LocalSet`.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a `LocalSet`.
    fn submit(&mut self, job: JobRef, unit: Unit) -> Result<()> {
        let handle = self.set.spawn_local(unit);
        debug!(task = %job.task, job = %job.label, "unit spawned on local set");
        self.jobs.insert(handle.id(), job);
        Ok(())
    }

    /// The timeout is ignored: a cooperative unit cannot be preempted, so
    /// waiting less would only make the caller spin.
    fn next_with_timeout(
        &mut self,
        _timeout: Option<Duration>,
    ) -> Pin<Box<dyn Future<Output = Option<UnitOutcome>> + '_>> {
        Box::pin(async move {
            let outcome = match self.set.join_next_with_id().await? {
                Ok((id, result)) => UnitOutcome {
                    job: self.jobs.remove(&id).unwrap_or_default(),
                    result,
                },
                Err(err) => UnitOutcome {
                    job: self.jobs.remove(&err.id()).unwrap_or_default(),
                    result: Err(join_error(err)),
                },
            };
            Some(outcome)
        })
    }
}
