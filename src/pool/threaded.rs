// src/pool/threaded.rs

//! Bounded parallel pool for local jobs.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};
use tracing::{debug, warn};

use crate::errors::{PipectlError, Result};
use crate::pool::{JobRef, Unit, UnitOutcome, WorkerPool, join_error};

/// Runs units on the multi-thread runtime with at most `workers` of them
/// executing at any one time. Units beyond that wait for a permit.
#[derive(Debug)]
pub struct ThreadedWorkerPool {
    set: JoinSet<anyhow::Result<()>>,
    jobs: HashMap<Id, JobRef>,
    permits: Arc<Semaphore>,
    workers: usize,
    closed: bool,
}

impl ThreadedWorkerPool {
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            set: JoinSet::new(),
            jobs: HashMap::new(),
            permits: Arc::new(Semaphore::new(workers)),
            workers,
            closed: false,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl WorkerPool for ThreadedWorkerPool {
    fn size(&self) -> usize {
        self.set.len()
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn terminate(&mut self) {
        if !self.set.is_empty() {
            warn!(outstanding = self.set.len(), "terminating threaded pool");
        }
        self.closed = true;
        self.permits.close();
        self.set.abort_all();
    }

    fn submit(&mut self, job: JobRef, unit: Unit) -> Result<()> {
        if self.closed {
            return Err(PipectlError::Other(anyhow::anyhow!(
                "pool is closed; cannot submit {} {}",
                job.task,
                job.label
            )));
        }

        let permits = Arc::clone(&self.permits);
        let handle = self.set.spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .context("worker pool shut down before the job started")?;
            unit.await
        });
        debug!(task = %job.task, job = %job.label, "unit queued on threaded pool");
        self.jobs.insert(handle.id(), job);
        Ok(())
    }

    fn next_with_timeout(
        &mut self,
        timeout: Option<Duration>,
    ) -> Pin<Box<dyn Future<Output = Option<UnitOutcome>> + '_>> {
        Box::pin(async move {
            let joined = match timeout {
                Some(limit) => tokio::time::timeout(limit, self.set.join_next_with_id())
                    .await
                    .ok()??,
                None => self.set.join_next_with_id().await?,
            };
            let outcome = match joined {
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
