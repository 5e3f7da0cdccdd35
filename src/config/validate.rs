// src/config/validate.rs

use crate::config::model::{PipelineConfig, RawPipelineConfig};
use crate::errors::{PipectlError, Result};

impl TryFrom<RawPipelineConfig> for PipelineConfig {
    type Error = PipectlError;

    fn try_from(raw: RawPipelineConfig) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(PipelineConfig::new_unchecked(raw.config, raw.cluster, raw.task))
    }
}

fn validate_raw_config(cfg: &RawPipelineConfig) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_global_config(cfg)?;
    validate_task_dependencies(cfg)?;
    validate_jobs(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawPipelineConfig) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(PipectlError::ConfigError(
            "pipeline must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawPipelineConfig) -> Result<()> {
    if cfg.config.multiprocess == Some(0) {
        return Err(PipectlError::ConfigError(
            "[config].multiprocess must be >= 1 (got 0)".to_string(),
        ));
    }

    if cfg.config.name.is_empty() || cfg.config.name.contains("::") {
        return Err(PipectlError::ConfigError(format!(
            "[config].name must be non-empty and must not contain '::' (got '{}')",
            cfg.config.name
        )));
    }

    Ok(())
}

fn validate_task_dependencies(cfg: &RawPipelineConfig) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            if !cfg.task.contains_key(dep) {
                return Err(PipectlError::ConfigError(format!(
                    "task '{}' has unknown dependency '{}' in `after`",
                    name, dep
                )));
            }
            if dep == name {
                return Err(PipectlError::ConfigError(format!(
                    "task '{}' cannot depend on itself in `after`",
                    name
                )));
            }
        }
    }
    Ok(())
}

fn validate_jobs(cfg: &RawPipelineConfig) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        let has_shorthand = !task.inputs.is_empty() || !task.outputs.is_empty();
        if has_shorthand && !task.job.is_empty() {
            return Err(PipectlError::ConfigError(format!(
                "task '{}' mixes `inputs`/`outputs` with [[task.{}.job]] entries",
                name, name
            )));
        }
        for (idx, job) in task.jobs().iter().enumerate() {
            if job.outputs.is_empty() {
                return Err(PipectlError::ConfigError(format!(
                    "job {} of task '{}' declares no outputs",
                    idx, name
                )));
            }
        }
    }
    Ok(())
}
