// src/config/model.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{PipectlError, Result};

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// name = "main"
/// without_cluster = true
///
/// [cluster]
/// submit = "srun --quiet"
///
/// [task.align]
/// cmd = "cp {inputs} {outputs}"
/// after = ["fetch"]
/// inputs = ["reads.fq"]
/// outputs = ["reads.bam"]
/// ```
///
/// Use `PipelineConfig::try_from(raw)` (or [`crate::config::load_and_validate`])
/// to obtain a validated [`PipelineConfig`].
#[derive(Debug, Clone, Deserialize)]
pub struct RawPipelineConfig {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub cluster: ClusterSection,

    /// All tasks from `[task.<name>]`, keyed by task name.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// Validated pipeline configuration.
///
/// Only constructible through validation, so the rest of the crate can
/// assume every `after` reference names an existing task.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineConfig {
    pub config: ConfigSection,
    pub cluster: ClusterSection,
    pub task: BTreeMap<String, TaskConfig>,
}

impl PipelineConfig {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        cluster: ClusterSection,
        task: BTreeMap<String, TaskConfig>,
    ) -> Self {
        Self {
            config,
            cluster,
            task,
        }
    }

    /// Resolved parameters as TOML, in the same layout the file is read in.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| PipectlError::ConfigError(format!("serializing config: {e}")))
    }

    /// Task name qualified with the pipeline namespace, e.g. `main::align`.
    pub fn qualified_name(&self, task: &str) -> String {
        format!("{}::{}", self.config.name, task)
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSection {
    /// Namespace prefix for task names in plan text and log records.
    #[serde(default = "default_name")]
    pub name: String,

    /// Number of concurrent jobs. If `None`, a backend-specific default is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiprocess: Option<usize>,

    /// Run every job locally on a bounded thread pool instead of submitting
    /// through the cluster session.
    #[serde(default)]
    pub without_cluster: bool,

    /// Stop the whole run at the first failing job.
    #[serde(default)]
    pub terminate_on_error: bool,
}

fn default_name() -> String {
    "main".to_string()
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            name: default_name(),
            multiprocess: None,
            without_cluster: false,
            terminate_on_error: false,
        }
    }
}

/// `[cluster]` section.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClusterSection {
    /// Command prefix used to submit a job, e.g. `"srun --quiet"`.
    ///
    /// When `None`, cluster jobs are run through `sh -c` directly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submit: Option<String>,

    /// Queue name, exported to submitted commands as `PIPECTL_CLUSTER_QUEUE`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue: Option<String>,
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Command template. `{inputs}` and `{outputs}` are replaced by the
    /// space-joined file lists of each job.
    pub cmd: String,

    /// Dependency list: this task runs after all tasks listed here.
    #[serde(default)]
    pub after: Vec<String>,

    /// Directories created before the task's jobs run.
    #[serde(default)]
    pub mkdir: Vec<String>,

    /// Inactive tasks are skipped by the engine but still appear in dumps.
    #[serde(default = "default_active")]
    pub active: bool,

    /// Single-job shorthand: inputs of the only job.
    #[serde(default)]
    pub inputs: Vec<String>,

    /// Single-job shorthand: outputs of the only job.
    #[serde(default)]
    pub outputs: Vec<String>,

    /// Explicit job list from `[[task.<name>.job]]`.
    #[serde(default)]
    pub job: Vec<JobConfig>,
}

fn default_active() -> bool {
    true
}

impl TaskConfig {
    /// Effective job list: either the explicit `[[job]]` entries or the
    /// single job described by the `inputs` / `outputs` shorthand.
    pub fn jobs(&self) -> Vec<JobConfig> {
        if !self.job.is_empty() {
            return self.job.clone();
        }
        if self.inputs.is_empty() && self.outputs.is_empty() {
            return Vec::new();
        }
        vec![JobConfig {
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
        }]
    }

    /// All outputs declared across this task's jobs.
    pub fn all_outputs(&self) -> Vec<String> {
        self.jobs().into_iter().flat_map(|j| j.outputs).collect()
    }
}

/// `[[task.<name>.job]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobConfig {
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
}

impl JobConfig {
    /// Label used in plan text and log records: `[in1, in2 -> out1, out2]`.
    pub fn label(&self) -> String {
        format!("[{} -> {}]", self.inputs.join(", "), self.outputs.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shorthand_yields_single_job() {
        let raw: RawPipelineConfig = toml::from_str(
            r#"
[task.align]
cmd = "cp {inputs} {outputs}"
inputs = ["x"]
outputs = ["out1.bam"]
"#,
        )
        .unwrap();

        let task = &raw.task["align"];
        assert!(task.active);
        assert_eq!(task.jobs().len(), 1);
        assert_eq!(task.jobs()[0].label(), "[x -> out1.bam]");
        assert_eq!(raw.config.name, "main");
    }

    #[test]
    fn explicit_job_list_is_used_as_is() {
        let raw: RawPipelineConfig = toml::from_str(
            r#"
[task.split]
cmd = "split {inputs}"

[[task.split.job]]
inputs = ["a"]
outputs = ["a.1", "a.2"]

[[task.split.job]]
inputs = ["b"]
outputs = ["b.1"]
"#,
        )
        .unwrap();

        let task = &raw.task["split"];
        assert_eq!(task.jobs().len(), 2);
        assert_eq!(task.all_outputs(), vec!["a.1", "a.2", "b.1"]);
        assert_eq!(task.jobs()[0].label(), "[a -> a.1, a.2]");
    }

    #[test]
    fn resolved_config_reads_back_as_the_same_pipeline() {
        let raw: RawPipelineConfig = toml::from_str(
            r#"
[config]
name = "rna"
multiprocess = 3

[task.fetch]
cmd = "cp {inputs} {outputs}"
inputs = ["raw.fq"]
outputs = ["reads.fq"]

[task.align]
cmd = "align {inputs}"
after = ["fetch"]
mkdir = ["bam"]

[[task.align.job]]
inputs = ["reads.fq"]
outputs = ["bam/a.bam"]
"#,
        )
        .unwrap();
        let cfg = PipelineConfig::new_unchecked(raw.config, raw.cluster, raw.task);

        let text = cfg.to_toml_string().unwrap();
        assert!(!text.contains("submit"));

        let back: RawPipelineConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.config.name, "rna");
        assert_eq!(back.config.multiprocess, Some(3));
        assert_eq!(back.task["align"].after, vec!["fetch"]);
        assert_eq!(back.task["align"].jobs(), cfg.task["align"].jobs());
        assert_eq!(back.task["fetch"].jobs()[0].label(), "[raw.fq -> reads.fq]");
    }
}
