#![allow(dead_code)]

use std::collections::BTreeMap;

use pipectl::config::{
    ClusterSection, ConfigSection, JobConfig, PipelineConfig, RawPipelineConfig, TaskConfig,
};

/// Builder for `PipelineConfig` to simplify test setup.
pub struct PipelineConfigBuilder {
    config: RawPipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RawPipelineConfig {
                config: ConfigSection::default(),
                cluster: ClusterSection::default(),
                task: BTreeMap::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.config.config.name = name.to_string();
        self
    }

    /// Run jobs on the threaded pool with `workers` permits.
    pub fn local(mut self, workers: usize) -> Self {
        self.config.config.without_cluster = true;
        self.config.config.multiprocess = Some(workers);
        self
    }

    /// Run jobs through the cluster session with up to `jobs` outstanding.
    pub fn cluster(mut self, jobs: usize) -> Self {
        self.config.config.without_cluster = false;
        self.config.config.multiprocess = Some(jobs);
        self
    }

    pub fn terminate_on_error(mut self, val: bool) -> Self {
        self.config.config.terminate_on_error = val;
        self
    }

    pub fn build(self) -> PipelineConfig {
        PipelineConfig::try_from(self.config).expect("Failed to build valid config from builder")
    }

    pub fn build_raw(self) -> RawPipelineConfig {
        self.config
    }
}

impl Default for PipelineConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            task: TaskConfig {
                cmd: cmd.to_string(),
                after: vec![],
                mkdir: vec![],
                active: true,
                inputs: vec![],
                outputs: vec![],
                job: vec![],
            },
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn mkdir(mut self, dir: &str) -> Self {
        self.task.mkdir.push(dir.to_string());
        self
    }

    pub fn active(mut self, val: bool) -> Self {
        self.task.active = val;
        self
    }

    /// Single-job shorthand.
    pub fn io(mut self, inputs: &[&str], outputs: &[&str]) -> Self {
        self.task.inputs = inputs.iter().map(|s| s.to_string()).collect();
        self.task.outputs = outputs.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Add an explicit `[[job]]` entry.
    pub fn job(mut self, inputs: &[&str], outputs: &[&str]) -> Self {
        self.task.job.push(JobConfig {
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}
