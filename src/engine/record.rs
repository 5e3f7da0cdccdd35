// src/engine/record.rs

//! The run engine's record stream.
//!
//! Every task and job transition is turned into a [`LogRecord`] from
//! [`ENGINE_MODULE`], shown to the progress tracker, and, if kept, logged
//! through `tracing` on the `pipectl::pipeline` target with any progress
//! fields the tracker attached.

use tracing::{Level, event};

use crate::engine::ENGINE_MODULE;
use crate::progress::{Decision, LogRecord, ProgressSink, ProgressTracker, TracingSink};

#[derive(Debug)]
pub struct RunLog<S: ProgressSink = TracingSink> {
    tracker: ProgressTracker<S>,
    kept: Vec<LogRecord>,
    dropped: usize,
}

impl<S: ProgressSink> RunLog<S> {
    pub fn new(tracker: ProgressTracker<S>) -> Self {
        Self {
            tracker,
            kept: Vec::new(),
            dropped: 0,
        }
    }

    pub fn record(&mut self, level: Level, message: impl Into<String>) -> Decision {
        let mut record = LogRecord::new(level, ENGINE_MODULE, message);
        let decision = self.tracker.apply_record(&mut record);
        match decision {
            Decision::Keep => {
                emit(&record);
                self.kept.push(record);
            }
            Decision::Drop => self.dropped += 1,
        }
        decision
    }

    pub fn info(&mut self, message: impl Into<String>) -> Decision {
        self.record(Level::INFO, message)
    }

    pub fn warn(&mut self, message: impl Into<String>) -> Decision {
        self.record(Level::WARN, message)
    }

    pub fn error(&mut self, message: impl Into<String>) -> Decision {
        self.record(Level::ERROR, message)
    }

    /// Records that reached the log handlers, in order.
    pub fn kept(&self) -> &[LogRecord] {
        &self.kept
    }

    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.kept.iter().map(|r| r.message.as_str())
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn tracker(&self) -> &ProgressTracker<S> {
        &self.tracker
    }
}

macro_rules! emit_at {
    ($level:expr, $record:expr) => {
        match &$record.progress {
            Some(p) => event!(
                target: "pipectl::pipeline",
                $level,
                task = %p.task,
                task_status = %p.task_status,
                task_total = p.task_total,
                task_completed = p.task_completed,
                task_completed_percent = p.task_completed_percent,
                "{}",
                $record.message
            ),
            None => event!(target: "pipectl::pipeline", $level, "{}", $record.message),
        }
    };
}

fn emit(record: &LogRecord) {
    match record.level {
        Level::ERROR => emit_at!(Level::ERROR, record),
        Level::WARN => emit_at!(Level::WARN, record),
        Level::INFO => emit_at!(Level::INFO, record),
        Level::DEBUG => emit_at!(Level::DEBUG, record),
        _ => emit_at!(Level::TRACE, record),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::parse_plan;
    use crate::progress::ProgressEvent;

    #[test]
    fn dropped_records_never_reach_the_log() {
        let plan = parse_plan("Tasks which will be run:\nTask = main::a\n    Job  = [ -> a.txt]\n      Job needs update: Missing file [a.txt]\n");
        let tracker = ProgressTracker::with_sink(plan, Vec::<ProgressEvent>::new());
        let mut log = RunLog::new(tracker);

        assert_eq!(log.info("Task enters queue = main::a"), Decision::Keep);
        assert_eq!(log.info("Job  = [bam] completed"), Decision::Drop);
        assert_eq!(log.info("Job  = [ -> a.txt] completed"), Decision::Keep);

        assert_eq!(log.dropped(), 1);
        assert_eq!(
            log.messages().collect::<Vec<_>>(),
            vec!["Task enters queue = main::a", "Job  = [ -> a.txt] completed"]
        );
        assert_eq!(log.tracker().sink().len(), 2);
        assert!(log.kept().iter().all(|r| r.progress.is_some()));
    }
}
