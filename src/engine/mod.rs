// src/engine/mod.rs

//! Run engine.
//!
//! - [`evaluate`] decides which jobs are out of date.
//! - [`runner`] dispatches them through a [`crate::pool::WorkerPool`].
//! - [`record`] turns transitions into log records and routes them through
//!   the progress tracker.
//! - [`touch`] marks outputs fresh without running anything.

/// Module identity carried by the engine's own transition records. The
/// progress tracker only inspects records from this module.
pub const ENGINE_MODULE: &str = "pipectl::engine";

pub mod evaluate;
pub mod record;
pub mod runner;
pub mod touch;

pub use evaluate::{EvaluatedJob, EvaluatedTask, Evaluation, ForceRun, evaluate};
pub use record::RunLog;
pub use runner::{Dispatch, RunOptions, RunSummary, run_pipeline};
pub use touch::touch_outputs;
