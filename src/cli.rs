// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::default_config_path;
use crate::types::PipelineAction;

/// Command-line arguments for `pipectl`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "pipectl",
    version,
    about = "Run a task pipeline locally or on a cluster, with live progress.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the pipeline file (TOML).
    #[arg(long, value_name = "PATH", default_value_os_t = default_config_path())]
    pub config: PathBuf,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PIPECTL_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Append logs to this file instead of stderr.
    #[arg(long, value_name = "FILE")]
    pub pipeline_logfile: Option<PathBuf>,

    /// Number of concurrent jobs. Overrides `[config].multiprocess`.
    #[arg(short = 'p', long, value_name = "N")]
    pub multiprocess: Option<usize>,

    /// Run every job locally instead of through the cluster session.
    #[arg(long)]
    pub without_cluster: bool,

    /// Stop the whole run at the first failing job.
    #[arg(short = 'i', long)]
    pub terminate: bool,

    /// Force a task to rerun even if it is up to date. `all` forces every
    /// task. May be given more than once.
    #[arg(short = 'f', long, value_name = "TASK|all")]
    pub force_run: Vec<String>,

    /// What to do: make, show, state, touch or printconfig.
    pub action: PipelineAction,

    /// Target tasks. Defaults to every task nothing else depends on.
    pub targets: Vec<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags_action_and_targets() {
        let args = CliArgs::try_parse_from([
            "pipectl",
            "-p",
            "4",
            "--without-cluster",
            "-i",
            "-f",
            "align",
            "make",
            "all",
        ])
        .unwrap();

        assert_eq!(args.multiprocess, Some(4));
        assert!(args.without_cluster);
        assert!(args.terminate);
        assert_eq!(args.force_run, vec!["align".to_string()]);
        assert_eq!(args.action, PipelineAction::Make);
        assert_eq!(args.targets, vec!["all".to_string()]);
        assert_eq!(args.config, default_config_path());
    }

    #[test]
    fn printconfig_action_with_default_config() {
        let args = CliArgs::try_parse_from(["pipectl", "printconfig"]).unwrap();
        assert_eq!(args.action, PipelineAction::PrintConfig);
        assert!(args.targets.is_empty());
    }

    #[test]
    fn rejects_unknown_action() {
        assert!(CliArgs::try_parse_from(["pipectl", "zap"]).is_err());
    }
}
