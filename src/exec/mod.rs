// src/exec/mod.rs

//! Process execution layer.
//!
//! Jobs run as shell commands through `tokio::process::Command`, either
//! directly (threaded backend) or wrapped by a cluster session's submit
//! prefix (cooperative backend). Both paths end up in [`run_command`].

pub mod command;

pub use command::{JobSpec, expand_command, run_command, shell_quote};
