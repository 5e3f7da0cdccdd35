// src/plan/parser.rs

//! One-shot parser for the dry-run plan text.
//!
//! The plan is diagnostic output, not a contract: anything that does not
//! look like a task header or a job fragment with a `[... -> output]`
//! label is skipped rather than reported.

use tracing::{debug, trace};

use crate::progress::patterns::{
    MKDIR_JOB_MARKER, MKDIR_TASK_PREFIX, NEEDS_UPDATE_MARKER, RUN_SECTION, TASK_HEADER,
    UPTODATE_SECTION, extract_job_output, job_token, leading_docstring,
};
use crate::progress::state::{JobIndex, TaskState};
use crate::types::TaskStatus;

/// Result of parsing a plan: initial task table plus the job index.
#[derive(Debug, Clone, Default)]
pub struct ParsedPlan {
    /// Tasks in order of first appearance.
    pub tasks: Vec<TaskState>,
    pub index: JobIndex,
}

/// A job fragment that survived parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PlanJob {
    output: String,
    needs_update: bool,
}

/// Parse plan `text` into task states and a job index.
pub fn parse_plan(text: &str) -> ParsedPlan {
    let mut parser = PlanParser::default();
    for raw in text.lines() {
        parser.feed_line(raw.trim());
    }
    parser.flush();

    debug!(
        tasks = parser.plan.tasks.len(),
        jobs = parser.plan.index.len(),
        "parsed execution plan"
    );
    parser.plan
}

#[derive(Debug)]
struct PlanParser<'t> {
    plan: ParsedPlan,
    mode: TaskStatus,
    current: Option<(&'t str, TaskStatus)>,
    block: Vec<&'t str>,
}

impl Default for PlanParser<'_> {
    fn default() -> Self {
        Self {
            plan: ParsedPlan::default(),
            mode: TaskStatus::Pending,
            current: None,
            block: Vec::new(),
        }
    }
}

impl<'t> PlanParser<'t> {
    fn feed_line(&mut self, line: &'t str) {
        if line.starts_with(RUN_SECTION) {
            self.flush();
            self.mode = TaskStatus::Pending;
            return;
        }
        if line.starts_with(UPTODATE_SECTION) {
            self.flush();
            self.mode = TaskStatus::UpToDate;
            return;
        }
        if let Some(name) = line.strip_prefix(TASK_HEADER) {
            self.flush();
            self.current = Some((name.trim(), self.mode));
            return;
        }
        if !line.is_empty() && self.current.is_some() {
            self.block.push(line);
        }
    }

    /// Close the current task block, if any.
    fn flush(&mut self) {
        let block = std::mem::take(&mut self.block);
        let Some((name, status)) = self.current.take() else {
            return;
        };

        if name.starts_with(MKDIR_TASK_PREFIX) {
            trace!(task = %name, "skipping directory bookkeeping task");
            return;
        }

        // Wrapped lines are glued back together without a separator; labels
        // are compared whitespace-free anyway.
        let jobs = split_jobs(&block.concat());
        let to_run = jobs.iter().filter(|j| j.needs_update).count();

        for job in &jobs {
            self.plan.index.insert(&job.output, name);
        }

        let state = TaskState {
            name: name.to_string(),
            status,
            total_jobs: jobs.len(),
            completed_jobs: jobs.len() - to_run,
        };

        match self.plan.tasks.iter_mut().find(|t| t.name == state.name) {
            Some(existing) => *existing = state,
            None => self.plan.tasks.push(state),
        }
    }
}

fn split_jobs(block: &str) -> Vec<PlanJob> {
    let block = leading_docstring().replace(block, "");

    job_token()
        .split(&block)
        .filter(|fragment| !fragment.trim().is_empty())
        .filter(|fragment| !fragment.contains(MKDIR_JOB_MARKER))
        .filter_map(|fragment| {
            let output = extract_job_output(fragment)?;
            Some(PlanJob {
                output: output.to_string(),
                needs_update: fragment.contains(NEEDS_UPDATE_MARKER),
            })
        })
        .collect()
}
