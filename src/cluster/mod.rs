// src/cluster/mod.rs

//! Cluster submission session.
//!
//! A run on the cooperative backend opens exactly one session, shares it
//! between every outstanding unit and closes it once when the run ends,
//! whether it ends normally, on error or by termination.

use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::config::model::ClusterSection;
use crate::errors::Result;
use crate::exec::{JobSpec, run_command, shell_quote};

/// Environment variable carrying the configured queue to submitted jobs.
pub const QUEUE_ENV: &str = "PIPECTL_CLUSTER_QUEUE";

pub type SubmitFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

/// A long-lived connection to a job scheduler.
pub trait ClusterSession: Send + Sync + Debug {
    fn open(&self) -> Result<()>;

    /// Submit one job and wait for it to finish.
    fn submit(&self, job: JobSpec) -> SubmitFuture<'_>;

    fn close(&self) -> Result<()>;
}

/// Session that submits jobs by prefixing their command with a configured
/// submit command (e.g. `srun --quiet`), or runs them directly when no
/// prefix is set.
#[derive(Debug, Clone, Default)]
pub struct ShellSession {
    submit: Option<String>,
    queue: Option<String>,
}

impl ShellSession {
    pub fn from_config(cluster: &ClusterSection) -> Self {
        Self {
            submit: cluster.submit.clone(),
            queue: cluster.queue.clone(),
        }
    }

    /// Final command line for `job`.
    pub fn command_for(&self, job: &JobSpec) -> String {
        match &self.submit {
            Some(prefix) => format!("{prefix} sh -c {}", shell_quote(&job.command)),
            None => job.command.clone(),
        }
    }
}

impl ClusterSession for ShellSession {
    fn open(&self) -> Result<()> {
        info!(submit = ?self.submit, queue = ?self.queue, "cluster session opened");
        Ok(())
    }

    fn submit(&self, mut job: JobSpec) -> SubmitFuture<'_> {
        Box::pin(async move {
            job.command = self.command_for(&job);
            if let Some(queue) = &self.queue {
                job.env.push((QUEUE_ENV.to_string(), queue.clone()));
            }
            run_command(&job).await
        })
    }

    fn close(&self) -> Result<()> {
        info!("cluster session closed");
        Ok(())
    }
}

/// Owner of the run's session. Closes it exactly once: explicitly through
/// [`SessionHandle::close`], or on drop if that never happened.
#[derive(Debug)]
pub struct SessionHandle {
    session: Arc<dyn ClusterSession>,
    closed: AtomicBool,
}

impl SessionHandle {
    pub fn open(session: Arc<dyn ClusterSession>) -> Result<Self> {
        session.open()?;
        Ok(Self {
            session,
            closed: AtomicBool::new(false),
        })
    }

    /// Shared session for units to submit through.
    pub fn session(&self) -> Arc<dyn ClusterSession> {
        Arc::clone(&self.session)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Close the session. Later calls are no-ops.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            debug!("cluster session already closed");
            return Ok(());
        }
        self.session.close()
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(error = %err, "failed to close cluster session");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[derive(Debug, Default)]
    struct CountingSession {
        opened: AtomicUsize,
        closed: AtomicUsize,
    }

    impl ClusterSession for CountingSession {
        fn open(&self) -> Result<()> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn submit(&self, _job: JobSpec) -> SubmitFuture<'_> {
            Box::pin(async { Ok::<_, anyhow::Error>(()) })
        }

        fn close(&self) -> Result<()> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn handle_closes_exactly_once() {
        let session = Arc::new(CountingSession::default());
        let handle = SessionHandle::open(session.clone()).unwrap();

        handle.close().unwrap();
        handle.close().unwrap();
        drop(handle);

        assert_eq!(session.opened.load(Ordering::SeqCst), 1);
        assert_eq!(session.closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_closes_an_open_session() {
        let session = Arc::new(CountingSession::default());
        {
            let _handle = SessionHandle::open(session.clone()).unwrap();
        }
        assert_eq!(session.closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn submit_prefix_wraps_the_command() {
        let session = ShellSession::from_config(&ClusterSection {
            submit: Some("srun --quiet".to_string()),
            queue: None,
        });
        let job = JobSpec {
            task: "main::t".to_string(),
            label: "[a -> b]".to_string(),
            command: "cp a b".to_string(),
            cwd: PathBuf::from("."),
            env: Vec::new(),
        };
        assert_eq!(session.command_for(&job), "srun --quiet sh -c 'cp a b'");
        assert_eq!(ShellSession::default().command_for(&job), "cp a b");
    }
}
