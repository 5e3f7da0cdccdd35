// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{PipelineConfig, RawPipelineConfig};
use crate::errors::Result;

/// Load a pipeline file from a given path and return the raw `RawPipelineConfig`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawPipelineConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawPipelineConfig = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a pipeline file from path and run validation.
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks for unknown `after` references, self-dependencies, malformed
///   job declarations and basic global config sanity.
///
/// Cycles are *not* rejected here: the run engine reports them when it
/// orders the graph, while the `state` dump can still inspect a cyclic graph.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<PipelineConfig> {
    let raw_config = load_from_path(&path)?;
    let config = PipelineConfig::try_from(raw_config)?;
    Ok(config)
}

/// Default pipeline file: `Pipeline.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Pipeline.toml")
}
