use std::fmt;
use std::str::FromStr;

/// Action requested on the command line.
///
/// - `Make`: evaluate the pipeline and run every out-of-date job.
/// - `Show`: print the dry-run plan without executing anything.
/// - `State`: dump the reachable task graph as a tab-separated table.
/// - `Touch`: mark the outputs of out-of-date jobs as fresh without running.
/// - `PrintConfig`: print the resolved pipeline parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineAction {
    Make,
    Show,
    State,
    Touch,
    PrintConfig,
}

impl FromStr for PipelineAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "make" => Ok(PipelineAction::Make),
            "show" => Ok(PipelineAction::Show),
            "state" => Ok(PipelineAction::State),
            "touch" => Ok(PipelineAction::Touch),
            "printconfig" => Ok(PipelineAction::PrintConfig),
            other => Err(format!(
                "unknown pipeline action {other} (expected make, show, state, touch or printconfig)"
            )),
        }
    }
}

/// Status of a task as reconstructed from the plan and the live record stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Queued to run but not yet entered.
    Pending,
    Running,
    Completed,
    /// Nothing to do for this task.
    UpToDate,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::UpToDate => "uptodate",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
