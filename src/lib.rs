// src/lib.rs

pub mod cli;
pub mod cluster;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod plan;
pub mod pool;
pub mod progress;
pub mod types;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use tokio::task::LocalSet;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::cli::CliArgs;
use crate::cluster::{ClusterSession, SessionHandle, ShellSession};
use crate::config::loader::load_and_validate;
use crate::config::model::PipelineConfig;
use crate::dag::dump_dag;
use crate::engine::{
    Dispatch, Evaluation, ForceRun, RunLog, RunOptions, RunSummary, evaluate, run_pipeline,
    touch_outputs,
};
use crate::fs::{FsQueryCache, RealFileSystem};
use crate::plan::{print_plan, render_plan};
use crate::pool::PoolBackend;
use crate::progress::ProgressTracker;
use crate::types::PipelineAction;

/// How long the engine waits on a pool before checking for newly ready
/// tasks again.
const POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and CLI overrides
/// - the requested action (`make`, `show`, `state`, `touch`, `printconfig`)
/// - a root `pipeline{name}` span stamping every record of the run
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = args.config.clone();
    let mut cfg = load_and_validate(&config_path)?;
    apply_overrides(&mut cfg, &args)?;

    let workdir = config_root_dir(&config_path);
    let force = ForceRun::from_flags(&args.force_run);
    let span = info_span!("pipeline", name = %cfg.config.name);

    execute(&cfg, &workdir, args.action, &args.targets, &force)
        .instrument(span)
        .await
}

/// Run one action against an already loaded pipeline.
pub async fn execute(
    cfg: &PipelineConfig,
    workdir: &Path,
    action: PipelineAction,
    targets: &[String],
    force: &ForceRun,
) -> Result<()> {
    debug!(?action, ?targets, ?force, workdir = %workdir.display(), "executing action");

    match action {
        PipelineAction::State => {
            let mut out = io::stdout().lock();
            dump_dag(cfg, targets, force.tasks(), &mut out)?;
            out.flush()?;
        }
        PipelineAction::Show => {
            let eval = evaluate_cached(cfg, workdir, targets, force)?;
            print_plan(&eval, &mut io::stdout().lock())?;
        }
        PipelineAction::Touch => {
            let eval = evaluate_cached(cfg, workdir, targets, force)?;
            let touched = touch_outputs(&eval)?;
            info!(files = touched, "outputs touched");
        }
        PipelineAction::Make => {
            make(cfg, workdir, targets, force).await?;
        }
        PipelineAction::PrintConfig => {
            info!("printing out pipeline parameters");
            let mut out = io::stdout().lock();
            out.write_all(cfg.to_toml_string()?.as_bytes())?;
            out.flush()?;
        }
    }
    Ok(())
}

/// Evaluate, print the plan for progress tracking, and dispatch every
/// out-of-date job. Cluster jobs go through a [`ShellSession`].
pub async fn make(
    cfg: &PipelineConfig,
    workdir: &Path,
    targets: &[String],
    force: &ForceRun,
) -> Result<RunSummary> {
    let session = Arc::new(ShellSession::from_config(&cfg.cluster));
    make_with_session(cfg, workdir, targets, force, session).await
}

/// [`make`] with an explicit cluster session. The session is only opened
/// when the cooperative backend is selected.
pub async fn make_with_session(
    cfg: &PipelineConfig,
    workdir: &Path,
    targets: &[String],
    force: &ForceRun,
    session: Arc<dyn ClusterSession>,
) -> Result<RunSummary> {
    let eval = evaluate_cached(cfg, workdir, targets, force)?;
    let plan = render_plan(&eval);
    debug!("execution plan:\n{plan}");

    let mut log = RunLog::new(ProgressTracker::from_plan(&plan));
    let backend = PoolBackend::select(&cfg.config);
    let opts = RunOptions {
        concurrency: backend.concurrency(),
        terminate_on_error: cfg.config.terminate_on_error,
        poll_timeout: Some(POLL_TIMEOUT),
    };
    let mut pool = backend.build();

    let summary = if backend.is_cooperative() {
        let session = SessionHandle::open(session)?;
        let dispatch = Dispatch::Cluster(session.session());
        let local = LocalSet::new();
        let result = local
            .run_until(run_pipeline(&eval, pool.as_mut(), &dispatch, &mut log, &opts))
            .await;
        let closed = session.close();
        match (result, closed) {
            (Err(err), Err(close_err)) => {
                warn!(error = %close_err, "failed to close cluster session after a failed run");
                return Err(err.into());
            }
            (result, closed) => {
                let summary = result?;
                closed?;
                summary
            }
        }
    } else {
        run_pipeline(&eval, pool.as_mut(), &Dispatch::Local, &mut log, &opts).await?
    };

    Ok(summary)
}

/// Up-to-date evaluation inside a filesystem query cache region.
pub fn evaluate_cached(
    cfg: &PipelineConfig,
    workdir: &Path,
    targets: &[String],
    force: &ForceRun,
) -> Result<Evaluation> {
    let real = RealFileSystem;
    let region = FsQueryCache::activate(&real);
    let eval = evaluate(cfg, workdir, targets, force, &region)?;
    let stats = region.stats();
    debug!(hits = stats.hits, misses = stats.misses, "evaluation cache");
    Ok(eval)
}

fn apply_overrides(cfg: &mut PipelineConfig, args: &CliArgs) -> Result<()> {
    if let Some(n) = args.multiprocess {
        if n == 0 {
            bail!("--multiprocess must be >= 1");
        }
        cfg.config.multiprocess = Some(n);
    }
    if args.without_cluster {
        cfg.config.without_cluster = true;
    }
    if args.terminate {
        cfg.config.terminate_on_error = true;
    }
    Ok(())
}

/// Directory job commands run in and relative paths resolve against.
///
/// - If the config path has a non-empty parent (e.g. "pipelines/Pipeline.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Pipeline.toml" (parent = ""),
///   we fall back to the current working directory "."
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}
