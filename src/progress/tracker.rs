// src/progress/tracker.rs

//! Streaming progress tracker.
//!
//! The tracker sits in front of the log handlers and watches the run
//! engine's own transition records. It never looks at engine state: all it
//! knows comes from the dry-run plan (see [`crate::plan::parse_plan`]) and
//! from the text of each record it is shown.

use std::collections::HashMap;

use tracing::{debug, info, trace};

use crate::engine::ENGINE_MODULE;
use crate::plan::{ParsedPlan, parse_plan};
use crate::progress::patterns::{
    JOB_COMPLETED_MARKER, PHASE_COMPLETED, PHASE_ENTERS_QUEUE, PHASE_SEPARATOR, PHASE_UPTODATE,
    extract_job_output, job_token, strip_namespace, task_token,
};
use crate::progress::state::{Decision, JobIndex, LogRecord, ProgressEvent, TaskState};
use crate::types::TaskStatus;

/// Receiver of progress events.
pub trait ProgressSink {
    fn emit(&mut self, event: &ProgressEvent);
}

/// Default sink: one structured `tracing` event per transition.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn emit(&mut self, event: &ProgressEvent) {
        info!(
            target: "pipectl::progress",
            task = %event.task,
            task_status = %event.task_status,
            task_total = event.task_total,
            task_completed = event.task_completed,
            task_completed_percent = event.task_completed_percent,
            "task progress"
        );
    }
}

/// Collects events; used by tests and by callers that render progress
/// themselves.
impl ProgressSink for Vec<ProgressEvent> {
    fn emit(&mut self, event: &ProgressEvent) {
        self.push(event.clone());
    }
}

/// Outcome of looking at a record, before any mutation is applied.
enum Transition<'r> {
    Job { task: String, completed: bool },
    Task { task: &'r str, status: TaskStatus },
}

#[derive(Debug)]
pub struct ProgressTracker<S: ProgressSink = TracingSink> {
    tasks: HashMap<String, TaskState>,
    index: JobIndex,
    sink: S,
}

impl ProgressTracker<TracingSink> {
    /// Build a tracker from plan text, emitting to `tracing`.
    pub fn from_plan(text: &str) -> Self {
        Self::with_sink(parse_plan(text), TracingSink)
    }
}

impl<S: ProgressSink> ProgressTracker<S> {
    pub fn with_sink(plan: ParsedPlan, sink: S) -> Self {
        let tasks = plan
            .tasks
            .into_iter()
            .map(|t| (t.name.clone(), t))
            .collect();
        Self {
            tasks,
            index: plan.index,
            sink,
        }
    }

    /// Look at one record, update task state on a recognized transition
    /// and decide whether the record continues downstream.
    ///
    /// Only job records whose output cannot be resolved are dropped;
    /// everything else is kept, with progress fields attached when it
    /// described a known transition.
    pub fn apply_record(&mut self, record: &mut LogRecord) -> Decision {
        if record.module != ENGINE_MODULE {
            return Decision::Keep;
        }

        let transition = if job_token().is_match(&record.message) {
            match self.job_transition(&record.message) {
                Some(t) => t,
                None => {
                    trace!(message = %record.message, "unresolvable job record dropped");
                    return Decision::Drop;
                }
            }
        } else if task_token().is_match(&record.message) {
            match self.task_transition(&record.message) {
                Some(t) => t,
                None => return Decision::Keep,
            }
        } else {
            return Decision::Keep;
        };

        let state = match transition {
            Transition::Job { task, completed } => {
                let Some(state) = self.tasks.get_mut(&task) else {
                    return Decision::Drop;
                };
                if completed {
                    state.completed_jobs += 1;
                }
                state
            }
            Transition::Task { task, status } => {
                let Some(state) = self.tasks.get_mut(task) else {
                    return Decision::Keep;
                };
                state.status = status;
                state
            }
        };

        let event = ProgressEvent::from_state(state, strip_namespace(&state.name));
        debug!(
            task = %state.name,
            completed = state.completed_jobs,
            total = state.total_jobs,
            "progress transition"
        );
        self.sink.emit(&event);
        record.progress = Some(event);
        Decision::Keep
    }

    fn job_transition(&self, message: &str) -> Option<Transition<'static>> {
        let output = extract_job_output(message)?;
        let task = self.index.owner_of(output)?;
        Some(Transition::Job {
            task: task.to_string(),
            completed: message.contains(JOB_COMPLETED_MARKER),
        })
    }

    fn task_transition<'r>(&self, message: &'r str) -> Option<Transition<'r>> {
        let parts: Vec<&str> = message.trim().split(PHASE_SEPARATOR).collect();
        let [phase, task] = parts.as_slice() else {
            return None;
        };
        if !self.tasks.contains_key(*task) {
            return None;
        }
        let status = match *phase {
            PHASE_ENTERS_QUEUE => TaskStatus::Running,
            PHASE_COMPLETED => TaskStatus::Completed,
            PHASE_UPTODATE => TaskStatus::UpToDate,
            _ => return None,
        };
        Some(Transition::Task { task, status })
    }

    pub fn task(&self, name: &str) -> Option<&TaskState> {
        self.tasks.get(name)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &TaskState> {
        self.tasks.values()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

#[cfg(test)]
mod tests {
    use tracing::Level;

    use super::*;

    const ALIGN_PLAN: &str = "\
Tasks which will be run:
Task = align
    Job  = [x -> out1.bam]
      Job needs update: Missing file [out1.bam]
    Job  = [x -> out2.bam]
      Job up-to-date
";

    fn tracker(plan: &str) -> ProgressTracker<Vec<ProgressEvent>> {
        ProgressTracker::with_sink(parse_plan(plan), Vec::new())
    }

    fn engine_record(message: &str) -> LogRecord {
        LogRecord::new(Level::INFO, ENGINE_MODULE, message)
    }

    #[test]
    fn completion_record_finishes_align() {
        let mut tracker = tracker(ALIGN_PLAN);
        let mut record = engine_record("Job  = [x -> out1.bam] completed");

        assert_eq!(tracker.apply_record(&mut record), Decision::Keep);

        let expected = ProgressEvent {
            task: "align".to_string(),
            task_status: TaskStatus::Pending,
            task_total: 2,
            task_completed: 2,
            task_completed_percent: 100.0,
        };
        assert_eq!(record.progress.as_ref(), Some(&expected));
        assert_eq!(tracker.sink(), &vec![expected]);
        assert_eq!(tracker.task("align").map(|t| t.completed_jobs), Some(2));
    }

    #[test]
    fn unknown_job_is_dropped_without_mutation() {
        let mut tracker = tracker(ALIGN_PLAN);
        let mut record = engine_record("Job  = [x -> elsewhere.bam] completed");

        assert_eq!(tracker.apply_record(&mut record), Decision::Drop);
        assert!(record.progress.is_none());
        assert!(tracker.sink().is_empty());
        assert_eq!(tracker.task("align").map(|t| t.completed_jobs), Some(1));
    }

    #[test]
    fn job_record_without_label_is_dropped() {
        let mut tracker = tracker(ALIGN_PLAN);
        let mut record = engine_record("Job  = [bam] completed");
        assert_eq!(tracker.apply_record(&mut record), Decision::Drop);
    }

    #[test]
    fn records_from_other_modules_pass_untouched() {
        let mut tracker = tracker(ALIGN_PLAN);
        let mut record = LogRecord::new(
            Level::INFO,
            "pipectl::other",
            "Job  = [x -> elsewhere.bam] completed",
        );
        assert_eq!(tracker.apply_record(&mut record), Decision::Keep);
        assert!(record.progress.is_none());
    }

    #[test]
    fn task_phases_update_status() {
        let mut tracker = tracker(ALIGN_PLAN);

        let mut record = engine_record("Task enters queue = align");
        assert_eq!(tracker.apply_record(&mut record), Decision::Keep);
        assert_eq!(
            record.progress.as_ref().map(|p| p.task_status),
            Some(TaskStatus::Running)
        );

        let mut record = engine_record("Completed Task = align");
        tracker.apply_record(&mut record);
        assert_eq!(
            tracker.task("align").map(|t| t.status),
            Some(TaskStatus::Completed)
        );
    }

    #[test]
    fn enters_queue_marks_namespaced_task_running() {
        let plan = "Tasks which will be run:\nTask = main::a\n    Job  = [x -> a.out]\n      Job needs update: Missing file [a.out]\n";
        let mut tracker = tracker(plan);
        let mut record = engine_record("Task enters queue = main::a");

        assert_eq!(tracker.apply_record(&mut record), Decision::Keep);
        assert_eq!(
            tracker.task("main::a").map(|t| t.status),
            Some(TaskStatus::Running)
        );
        let progress = record.progress.expect("progress attached");
        assert_eq!(progress.task, "a");
        assert_eq!(progress.task_status, TaskStatus::Running);
        assert_eq!(tracker.sink().len(), 1);
    }

    #[test]
    fn surrounding_whitespace_does_not_hide_the_task() {
        let mut tracker = tracker(ALIGN_PLAN);
        let mut record = engine_record("  Completed Task = align\n");

        tracker.apply_record(&mut record);
        assert_eq!(
            tracker.task("align").map(|t| t.status),
            Some(TaskStatus::Completed)
        );
        assert!(record.progress.is_some());
    }

    #[test]
    fn malformed_task_records_are_kept_unchanged() {
        let mut tracker = tracker(ALIGN_PLAN);
        for message in [
            "Task = align = extra",
            "Task enters queue = missing",
            "Strange Task = align",
            "Task =align",
        ] {
            let mut record = engine_record(message);
            assert_eq!(tracker.apply_record(&mut record), Decision::Keep, "{message}");
            assert!(record.progress.is_none(), "{message}");
        }
        assert!(tracker.sink().is_empty());
    }

    #[test]
    fn namespace_is_stripped_for_display_only() {
        let plan = "Tasks which will be run:\nTask = main::align\n    Job  = [x -> o]\n      Job needs update: Missing file [o]\n";
        let mut tracker = tracker(plan);
        let mut record = engine_record("Uptodate Task = main::align");

        tracker.apply_record(&mut record);

        assert_eq!(record.progress.map(|p| p.task), Some("align".to_string()));
        assert!(tracker.task("main::align").is_some());
    }

    #[test]
    fn job_record_without_completion_reemits_counts() {
        let mut tracker = tracker(ALIGN_PLAN);
        let mut record = engine_record("Job  = [x -> out1.bam] submitted");
        assert_eq!(tracker.apply_record(&mut record), Decision::Keep);
        assert_eq!(record.progress.map(|p| p.task_completed), Some(1));
    }

    #[test]
    fn zero_job_task_reports_zero_percent() {
        let mut tracker = tracker("Tasks which will be run:\nTask = all\n");
        let mut record = engine_record("Completed Task = all");
        tracker.apply_record(&mut record);
        assert_eq!(
            record.progress.map(|p| p.task_completed_percent),
            Some(0.0)
        );
    }
}
