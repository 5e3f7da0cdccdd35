// src/engine/runner.rs

//! Dispatch of an evaluated pipeline through a worker pool.
//!
//! A task is started once every dependency that has work in this run has
//! completed. Its out-of-date jobs are queued and submitted while fewer
//! than `concurrency` units are outstanding. The engine keeps its own
//! count of outstanding units; a pool's reported size is only a
//! presentation value.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{debug, info};

use crate::cluster::ClusterSession;
use crate::engine::evaluate::{EvaluatedTask, Evaluation};
use crate::engine::record::RunLog;
use crate::errors::{PipectlError, Result};
use crate::exec::{JobSpec, expand_command, run_command};
use crate::pool::{JobRef, Unit, WorkerPool};
use crate::progress::ProgressSink;
use crate::progress::patterns::{
    JOB_COMPLETED_MARKER, PHASE_COMPLETED, PHASE_ENTERS_QUEUE, PHASE_SEPARATOR, PHASE_UPTODATE,
};

/// How jobs turn into pool units.
#[derive(Debug, Clone)]
pub enum Dispatch {
    /// Run the command directly.
    Local,
    /// Submit through the run's shared cluster session.
    Cluster(Arc<dyn ClusterSession>),
}

impl Dispatch {
    pub fn unit(&self, spec: JobSpec) -> Unit {
        match self {
            Dispatch::Local => Box::pin(async move { run_command(&spec).await }),
            Dispatch::Cluster(session) => {
                let session = Arc::clone(session);
                Box::pin(async move { session.submit(spec).await })
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Maximum number of outstanding units.
    pub concurrency: usize,
    pub terminate_on_error: bool,
    /// Passed to [`WorkerPool::next_with_timeout`]. Backends that honour it
    /// return early; the engine then simply waits again.
    pub poll_timeout: Option<Duration>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            terminate_on_error: false,
            poll_timeout: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub jobs_run: usize,
    pub tasks_completed: usize,
    /// Tasks never started because an upstream task failed.
    pub skipped: Vec<String>,
}

#[derive(Debug)]
struct Failure {
    task: String,
    job: String,
    message: String,
}

/// Run every out-of-date job of `eval` through `pool`.
pub async fn run_pipeline<S: ProgressSink>(
    eval: &Evaluation,
    pool: &mut dyn WorkerPool,
    dispatch: &Dispatch,
    log: &mut RunLog<S>,
    opts: &RunOptions,
) -> Result<RunSummary> {
    for task in eval.up_to_date() {
        log.info(format!("{PHASE_UPTODATE}{PHASE_SEPARATOR}{}", task.qualified));
    }

    let to_run: Vec<&EvaluatedTask> = eval.to_run().collect();
    let by_name: HashMap<&str, &EvaluatedTask> =
        to_run.iter().map(|t| (t.name.as_str(), *t)).collect();
    let concurrency = opts.concurrency.max(1);

    let mut started: HashSet<&str> = HashSet::new();
    let mut finished: HashSet<&str> = HashSet::new();
    let mut failed: HashSet<&str> = HashSet::new();
    let mut remaining: HashMap<&str, usize> = HashMap::new();
    let mut queue: VecDeque<(&str, JobSpec)> = VecDeque::new();
    let mut failures: Vec<Failure> = Vec::new();
    let mut in_flight = 0usize;
    let mut summary = RunSummary::default();

    info!(tasks = to_run.len(), concurrency, "dispatching pipeline");

    loop {
        // Tasks without outstanding jobs complete on the spot, which can make
        // their dependents ready in turn.
        loop {
            let ready: Vec<&EvaluatedTask> = to_run
                .iter()
                .copied()
                .filter(|t| !started.contains(t.name.as_str()))
                .filter(|t| {
                    t.deps
                        .iter()
                        .all(|d| !by_name.contains_key(d.as_str()) || finished.contains(d.as_str()))
                })
                .collect();
            if ready.is_empty() {
                break;
            }

            for task in ready {
                started.insert(&task.name);
                log.info(format!("{PHASE_ENTERS_QUEUE}{PHASE_SEPARATOR}{}", task.qualified));

                if let Err(err) = make_directories(task, log).await {
                    let failure = Failure {
                        task: task.qualified.clone(),
                        job: task.mkdir_task.clone().unwrap_or_default(),
                        message: format!("{err:#}"),
                    };
                    log.error(format!(
                        "Failed to create directories for {}: {}",
                        failure.task, failure.message
                    ));
                    failed.insert(&task.name);
                    if opts.terminate_on_error {
                        pool.terminate();
                        return Err(failure.into());
                    }
                    failures.push(failure);
                    continue;
                }

                let jobs: Vec<JobSpec> = task
                    .jobs_to_run()
                    .map(|job| JobSpec {
                        task: task.qualified.clone(),
                        label: job.label.clone(),
                        command: expand_command(&task.cmd, &job.inputs, &job.outputs),
                        cwd: eval.workdir.clone(),
                        env: Vec::new(),
                    })
                    .collect();

                if jobs.is_empty() {
                    complete_task(task, log, &mut finished, &mut summary);
                    continue;
                }
                remaining.insert(&task.name, jobs.len());
                queue.extend(jobs.into_iter().map(|spec| (task.name.as_str(), spec)));
            }
        }

        while in_flight < concurrency {
            let Some((task, spec)) = queue.pop_front() else {
                break;
            };
            let job = JobRef::new(task, spec.label.clone());
            pool.submit(job, dispatch.unit(spec))?;
            in_flight += 1;
        }

        if in_flight == 0 {
            break;
        }

        let Some(outcome) = pool.next_with_timeout(opts.poll_timeout).await else {
            if opts.poll_timeout.is_some() {
                debug!(in_flight, "no unit finished within the poll timeout");
                continue;
            }
            break;
        };
        in_flight -= 1;

        let Some(task) = by_name.get(outcome.job.task.as_str()).copied() else {
            log.warn(format!("Result for unknown job {}", outcome.job.label));
            continue;
        };

        match outcome.result {
            Ok(()) => {
                summary.jobs_run += 1;
                log.info(format!("Job  = {} {JOB_COMPLETED_MARKER}", outcome.job.label));

                if let Some(left) = remaining.get_mut(task.name.as_str()) {
                    *left = left.saturating_sub(1);
                    if *left == 0 && !failed.contains(task.name.as_str()) {
                        complete_task(task, log, &mut finished, &mut summary);
                    }
                }
            }
            Err(err) => {
                let failure = Failure {
                    task: task.qualified.clone(),
                    job: outcome.job.label,
                    message: format!("{err:#}"),
                };
                log.error(format!(
                    "Failed job {} of {}: {}",
                    failure.job, failure.task, failure.message
                ));
                failed.insert(&task.name);
                if opts.terminate_on_error {
                    pool.terminate();
                    return Err(failure.into());
                }
                failures.push(failure);
            }
        }
    }

    pool.close();

    for task in &to_run {
        if !started.contains(task.name.as_str()) {
            log.warn(format!(
                "Skipped {}: an upstream task failed",
                task.qualified
            ));
            summary.skipped.push(task.qualified.clone());
        }
    }

    if !failures.is_empty() {
        for (idx, failure) in failures.iter().enumerate() {
            log.error(format!(
                "{}: Task={} Error={} {}",
                idx + 1,
                failure.task,
                failure.message,
                failure.job
            ));
        }
        return Err(PipectlError::PipelineFailed {
            count: failures.len(),
        });
    }

    info!(
        jobs = summary.jobs_run,
        tasks = summary.tasks_completed,
        "pipeline finished"
    );
    Ok(summary)
}

impl From<Failure> for PipectlError {
    fn from(failure: Failure) -> Self {
        PipectlError::JobFailed {
            task: failure.task,
            job: failure.job,
            message: failure.message,
        }
    }
}

fn complete_task<'e, S: ProgressSink>(
    task: &'e EvaluatedTask,
    log: &mut RunLog<S>,
    finished: &mut HashSet<&'e str>,
    summary: &mut RunSummary,
) {
    finished.insert(&task.name);
    summary.tasks_completed += 1;
    log.info(format!("{PHASE_COMPLETED}{PHASE_SEPARATOR}{}", task.qualified));
}

async fn make_directories<S: ProgressSink>(
    task: &EvaluatedTask,
    log: &mut RunLog<S>,
) -> anyhow::Result<()> {
    let Some(mkdir_task) = &task.mkdir_task else {
        return Ok(());
    };

    log.info(format!("{PHASE_ENTERS_QUEUE}{PHASE_SEPARATOR}{mkdir_task}"));
    for dir in &task.mkdir {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("creating directory {}", dir.display()))?;
        log.info(format!("Job  = [{}] {JOB_COMPLETED_MARKER}", dir.display()));
    }
    log.info(format!("{PHASE_COMPLETED}{PHASE_SEPARATOR}{mkdir_task}"));
    Ok(())
}
