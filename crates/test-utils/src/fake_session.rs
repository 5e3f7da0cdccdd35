use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::ThreadId;

use pipectl::cluster::{ClusterSession, SubmitFuture};
use pipectl::errors::Result;
use pipectl::exec::{JobSpec, run_command};

/// A fake cluster session that:
/// - records every submitted job and the thread it was submitted on
/// - tracks how many submissions were outstanding at once
/// - fails jobs whose label contains one of the configured fragments
/// - optionally runs the real command, so outputs appear on disk
/// - optionally fails to close
#[derive(Debug, Default)]
pub struct RecordingSession {
    submitted: Mutex<Vec<JobSpec>>,
    threads: Mutex<HashSet<ThreadId>>,
    failing: Vec<String>,
    run_commands: bool,
    fail_close: bool,
    opened: AtomicUsize,
    closed: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl RecordingSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every job whose label contains `fragment`.
    pub fn failing(mut self, fragment: &str) -> Self {
        self.failing.push(fragment.to_string());
        self
    }

    /// Run the job's command for real after recording it.
    pub fn running_commands(mut self) -> Self {
        self.run_commands = true;
        self
    }

    /// Make `close` return an error (after counting the call).
    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn submitted(&self) -> Vec<JobSpec> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn submitted_labels(&self) -> Vec<String> {
        self.submitted().into_iter().map(|j| j.label).collect()
    }

    pub fn thread_count(&self) -> usize {
        self.threads.lock().unwrap().len()
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Highest number of submissions in flight at the same time.
    pub fn peak_outstanding(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl ClusterSession for RecordingSession {
    fn open(&self) -> Result<()> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn submit(&self, job: JobSpec) -> SubmitFuture<'_> {
        Box::pin(async move {
            self.submitted.lock().unwrap().push(job.clone());
            self.threads
                .lock()
                .unwrap()
                .insert(std::thread::current().id());

            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            // Suspend like a real submission would, so other units get to
            // submit before this one finishes.
            for _ in 0..3 {
                tokio::task::yield_now().await;
            }

            let result = if self.failing.iter().any(|f| job.label.contains(f.as_str())) {
                Err(anyhow::anyhow!("job {} rejected by fake cluster", job.label))
            } else if self.run_commands {
                run_command(&job).await
            } else {
                Ok(())
            };

            self.active.fetch_sub(1, Ordering::SeqCst);
            result
        })
    }

    fn close(&self) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(anyhow::anyhow!("fake cluster refused to close").into());
        }
        Ok(())
    }
}
