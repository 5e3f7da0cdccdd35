// src/engine/evaluate.rs

//! Up-to-date evaluation of the jobs reachable from a target set.
//!
//! This is the pass that issues the bulk of filesystem metadata queries, so
//! callers normally hand it a [`crate::fs::CacheRegion`].

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, trace};

use crate::config::model::{JobConfig, PipelineConfig};
use crate::dag::DagGraph;
use crate::errors::Result;
use crate::fs::FileSystem;
use crate::progress::patterns::MKDIR_TASK_PREFIX;

/// Which tasks are forced to rerun regardless of file state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ForceRun {
    #[default]
    None,
    /// The named tasks, which also become targets.
    Tasks(Vec<String>),
    All,
}

impl ForceRun {
    /// Interpret the `--force-run` values: `all` forces every task, any
    /// other value names a task.
    pub fn from_flags(flags: &[String]) -> Self {
        if flags.is_empty() {
            ForceRun::None
        } else if flags.iter().any(|f| f.trim().eq_ignore_ascii_case("all")) {
            ForceRun::All
        } else {
            ForceRun::Tasks(flags.to_vec())
        }
    }

    /// Named forced tasks; empty for `None` and `All`.
    pub fn tasks(&self) -> &[String] {
        match self {
            ForceRun::Tasks(tasks) => tasks,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone)]
pub struct EvaluatedJob {
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    /// `[inputs -> outputs]`
    pub label: String,
    /// Why the job has to run, or `None` if it is up to date.
    pub reason: Option<String>,
}

impl EvaluatedJob {
    pub fn needs_update(&self) -> bool {
        self.reason.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct EvaluatedTask {
    pub name: String,
    /// `<pipeline>::<name>`, as used in plan text and records.
    pub qualified: String,
    pub cmd: String,
    /// Dependencies that take part in this evaluation.
    pub deps: Vec<String>,
    pub mkdir: Vec<PathBuf>,
    /// Name of the directory bookkeeping task, if this task runs and has
    /// directories to create.
    pub mkdir_task: Option<String>,
    pub jobs: Vec<EvaluatedJob>,
}

impl EvaluatedTask {
    pub fn needs_update(&self) -> bool {
        self.jobs.iter().any(|j| j.needs_update())
    }

    pub fn jobs_to_run(&self) -> impl Iterator<Item = &EvaluatedJob> {
        self.jobs.iter().filter(|j| j.needs_update())
    }
}

/// Evaluated tasks in execution order, dependencies first.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub workdir: PathBuf,
    pub tasks: Vec<EvaluatedTask>,
}

impl Evaluation {
    pub fn to_run(&self) -> impl Iterator<Item = &EvaluatedTask> {
        self.tasks.iter().filter(|t| t.needs_update())
    }

    pub fn up_to_date(&self) -> impl Iterator<Item = &EvaluatedTask> {
        self.tasks.iter().filter(|t| !t.needs_update())
    }

    pub fn task(&self, name: &str) -> Option<&EvaluatedTask> {
        self.tasks.iter().find(|t| t.name == name)
    }
}

/// Evaluate every active task needed to build `targets`.
///
/// Forced tasks are added to the targets; with neither targets nor forced
/// tasks, all terminal tasks are used. A job needs an update if
/// its task is forced, if any upstream task in this evaluation has work to
/// do, if an output is missing, or if an input is newer than the oldest
/// output. Tasks without jobs are aggregation points and never need an
/// update themselves.
pub fn evaluate(
    cfg: &PipelineConfig,
    workdir: &Path,
    targets: &[String],
    force: &ForceRun,
    fs: &dyn FileSystem,
) -> Result<Evaluation> {
    let graph = DagGraph::from_config(cfg);
    let mut targets = if targets.is_empty() && force.tasks().is_empty() {
        graph.terminal_tasks()
    } else {
        targets.to_vec()
    };
    for task in force.tasks() {
        if !targets.contains(task) {
            targets.push(task.clone());
        }
    }

    let closure = graph.upstream_closure(&targets)?;
    let order = graph.execution_order(&closure)?;
    let forced: HashSet<&str> = match force {
        ForceRun::None => HashSet::new(),
        ForceRun::Tasks(tasks) => tasks.iter().map(|s| s.as_str()).collect(),
        ForceRun::All => closure.iter().map(|s| s.as_str()).collect(),
    };

    let mut outdated: BTreeSet<String> = BTreeSet::new();
    let mut tasks = Vec::new();
    let mut mkdir_counter = 0;

    for name in order {
        let Some(task) = cfg.task.get(&name) else {
            continue;
        };
        if !task.active {
            debug!(task = %name, "task is inactive; leaving it out of the evaluation");
            continue;
        }

        let deps: Vec<String> = task
            .after
            .iter()
            .filter(|d| closure.contains(*d))
            .cloned()
            .collect();
        let upstream_outdated = deps.iter().find(|d| outdated.contains(*d));

        let jobs: Vec<EvaluatedJob> = task
            .jobs()
            .into_iter()
            .map(|job| {
                let reason = if forced.contains(name.as_str()) {
                    Some("Forced to rerun".to_string())
                } else if let Some(dep) = upstream_outdated {
                    Some(format!("Previous task {dep} is out of date"))
                } else {
                    job_out_of_date(fs, workdir, &job)
                };
                EvaluatedJob {
                    label: job.label(),
                    inputs: job.inputs,
                    outputs: job.outputs,
                    reason,
                }
            })
            .collect();

        let qualified = cfg.qualified_name(&name);
        let mut evaluated = EvaluatedTask {
            name: name.clone(),
            qualified,
            cmd: task.cmd.clone(),
            deps,
            mkdir: task.mkdir.iter().map(|d| workdir.join(d)).collect(),
            mkdir_task: None,
            jobs,
        };

        if evaluated.needs_update() {
            outdated.insert(name.clone());
            if !evaluated.mkdir.is_empty() {
                mkdir_counter += 1;
                evaluated.mkdir_task = Some(format!(
                    "{MKDIR_TASK_PREFIX} {mkdir_counter}) before {}",
                    evaluated.qualified
                ));
            }
        }

        trace!(
            task = %name,
            jobs = evaluated.jobs.len(),
            to_run = evaluated.jobs_to_run().count(),
            "task evaluated"
        );
        tasks.push(evaluated);
    }

    debug!(
        tasks = tasks.len(),
        outdated = outdated.len(),
        "up-to-date evaluation finished"
    );

    Ok(Evaluation {
        workdir: workdir.to_path_buf(),
        tasks,
    })
}

/// Reason why `job` must run, judged from file state alone.
fn job_out_of_date(fs: &dyn FileSystem, workdir: &Path, job: &JobConfig) -> Option<String> {
    let mut oldest_output: Option<SystemTime> = None;

    for output in &job.outputs {
        let path = workdir.join(output);
        match fs.stat(&path) {
            Ok(stat) => {
                if let Some(modified) = stat.modified {
                    oldest_output = Some(oldest_output.map_or(modified, |t| t.min(modified)));
                }
            }
            Err(_) => {
                return Some(format!(
                    "Missing file [{}]",
                    display_path(fs, workdir, &path)
                ));
            }
        }
    }

    let oldest_output = oldest_output?;

    for input in &job.inputs {
        let path = resolve_input(fs, &workdir.join(input));
        // Missing inputs surface when the job runs; they do not make the
        // outputs stale.
        let Ok(stat) = fs.stat(&path) else {
            continue;
        };
        if stat.modified.is_some_and(|m| m > oldest_output) {
            return Some(format!(
                "Input file [{}] is newer than its outputs",
                display_path(fs, workdir, &path)
            ));
        }
    }

    None
}

fn resolve_input(fs: &dyn FileSystem, path: &Path) -> PathBuf {
    if !fs.is_symlink(path) {
        return path.to_path_buf();
    }
    match fs.canonicalize(path) {
        Ok(target) => {
            trace!(link = ?path, target = ?target, "input is a symlink");
            target
        }
        Err(_) => path.to_path_buf(),
    }
}

/// `path` relative to the working directory, for messages.
fn display_path(fs: &dyn FileSystem, workdir: &Path, path: &Path) -> String {
    fs.absolute(path)
        .and_then(|abs| {
            let base = fs.absolute(workdir)?;
            fs.relative(&abs, &base)
        })
        .map(|rel| rel.display().to_string())
        .unwrap_or_else(|_| path.display().to_string())
}
