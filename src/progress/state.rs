// src/progress/state.rs

use std::collections::HashMap;

use tracing::Level;

use crate::progress::patterns::normalize_label;
use crate::types::TaskStatus;

/// Completion state of one task, reconstructed from plan text and records.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskState {
    pub name: String,
    pub status: TaskStatus,
    pub total_jobs: usize,
    pub completed_jobs: usize,
}

impl TaskState {
    /// `100 * completed / total`, or 0 for a task without jobs.
    pub fn completed_percent(&self) -> f64 {
        if self.total_jobs > 0 {
            100.0 * self.completed_jobs as f64 / self.total_jobs as f64
        } else {
            0.0
        }
    }
}

/// Normalized job label -> owning task name.
///
/// Later insertions of the same label replace earlier ones.
#[derive(Debug, Clone, Default)]
pub struct JobIndex {
    owners: HashMap<String, String>,
}

impl JobIndex {
    pub fn insert(&mut self, label: &str, task: &str) {
        self.owners.insert(normalize_label(label), task.to_string());
    }

    /// Owner of `label`; the label is normalized before lookup.
    pub fn owner_of(&self, label: &str) -> Option<&str> {
        self.owners.get(&normalize_label(label)).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

/// Structured progress of one task after a recognized transition.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    /// Task name without its namespace prefix.
    pub task: String,
    pub task_status: TaskStatus,
    pub task_total: usize,
    pub task_completed: usize,
    pub task_completed_percent: f64,
}

impl ProgressEvent {
    pub fn from_state(state: &TaskState, display_name: &str) -> Self {
        Self {
            task: display_name.to_string(),
            task_status: state.status,
            task_total: state.total_jobs,
            task_completed: state.completed_jobs,
            task_completed_percent: state.completed_percent(),
        }
    }
}

/// One record of the live run log.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub level: Level,
    /// Module the record originates from.
    pub module: String,
    pub message: String,
    /// Progress fields attached by the tracker on a recognized transition.
    pub progress: Option<ProgressEvent>,
}

impl LogRecord {
    pub fn new(level: Level, module: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            module: module.into(),
            message: message.into(),
            progress: None,
        }
    }
}

/// Whether a record continues to downstream log handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Keep,
    Drop,
}
