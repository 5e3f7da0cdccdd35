// src/progress/patterns.rs

//! Every textual marker shared by the plan printer, the plan parser, the
//! run engine's records and the progress tracker.

use std::sync::OnceLock;

use regex::Regex;

/// Section marker for tasks with at least one job to run.
pub const RUN_SECTION: &str = "Tasks which will be run";
/// Section marker for tasks with nothing to do.
pub const UPTODATE_SECTION: &str = "Tasks which are up-to-date";
/// Prefix of a task header line in the plan.
pub const TASK_HEADER: &str = "Task = ";
/// Name prefix of synthetic directory-creation tasks.
pub const MKDIR_TASK_PREFIX: &str = "(mkdir";
/// Marker of directory-creation job fragments.
pub const MKDIR_JOB_MARKER: &str = "Make missing directories";
/// Marker of a job that has to run.
pub const NEEDS_UPDATE_MARKER: &str = "Job needs update";
pub const UP_TO_DATE_MARKER: &str = "Job up-to-date";
/// Marker of a finished job in a live record.
pub const JOB_COMPLETED_MARKER: &str = "completed";

pub const PHASE_ENTERS_QUEUE: &str = "Task enters queue";
pub const PHASE_COMPLETED: &str = "Completed Task";
pub const PHASE_UPTODATE: &str = "Uptodate Task";

/// Separator between a task-transition phase and the task name.
pub const PHASE_SEPARATOR: &str = " = ";
/// Separator between the namespace prefix and the task name.
pub const NAMESPACE_SEPARATOR: &str = "::";

static JOB_TOKEN: OnceLock<Regex> = OnceLock::new();
static TASK_TOKEN: OnceLock<Regex> = OnceLock::new();
static JOB_OUTPUT: OnceLock<Regex> = OnceLock::new();
static LEADING_DOCSTRING: OnceLock<Regex> = OnceLock::new();
static WHITESPACE: OnceLock<Regex> = OnceLock::new();

/// `Job = ` with any amount of whitespace before the `=`.
pub fn job_token() -> &'static Regex {
    JOB_TOKEN.get_or_init(|| Regex::new(r"Job\s+=").expect("JOB_TOKEN is valid"))
}

/// A task-transition record: the word `Task` somewhere before the first
/// `=`, as in `Task enters queue = x` or `Completed Task = x`.
pub fn task_token() -> &'static Regex {
    TASK_TOKEN.get_or_init(|| Regex::new(r"\bTask\b[^=]*=").expect("TASK_TOKEN is valid"))
}

fn job_output() -> &'static Regex {
    JOB_OUTPUT.get_or_init(|| Regex::new(r"\[.*-> ([^\]]+)\]").expect("JOB_OUTPUT is valid"))
}

/// A quoted docstring at the very start of a task block.
pub fn leading_docstring() -> &'static Regex {
    LEADING_DOCSTRING
        .get_or_init(|| Regex::new(r#"^"[^"]+""#).expect("LEADING_DOCSTRING is valid"))
}

/// Output identifier of the first `[... -> <identifier>]` in `text`.
pub fn extract_job_output(text: &str) -> Option<&str> {
    job_output()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Job label with all whitespace removed. Long labels get wrapped in plan
/// text, so this is the only form that compares reliably.
pub fn normalize_label(label: &str) -> String {
    WHITESPACE
        .get_or_init(|| Regex::new(r"\s").expect("WHITESPACE is valid"))
        .replace_all(label, "")
        .into_owned()
}

/// Task name without its leading `<prefix>::`, for display only.
pub fn strip_namespace(task: &str) -> &str {
    match task.find(NAMESPACE_SEPARATOR) {
        Some(idx) if idx > 0 => &task[idx + NAMESPACE_SEPARATOR.len()..],
        _ => task,
    }
}
