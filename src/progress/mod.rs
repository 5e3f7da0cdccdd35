// src/progress/mod.rs

//! Progress reconstruction from the dry-run plan and the live record
//! stream.

pub mod patterns;
pub mod state;
pub mod tracker;

pub use state::{Decision, JobIndex, LogRecord, ProgressEvent, TaskState};
pub use tracker::{ProgressSink, ProgressTracker, TracingSink};
