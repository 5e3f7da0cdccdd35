// src/exec/command.rs

use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::model::JobConfig;

/// Number of trailing stderr lines kept for the error message of a failed
/// job.
const STDERR_TAIL: usize = 20;

/// Everything needed to run one job, detached from the config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    /// Qualified task name.
    pub task: String,
    pub label: String,
    pub command: String,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
}

impl JobSpec {
    pub fn new(task: &str, template: &str, job: &JobConfig, cwd: PathBuf) -> Self {
        Self {
            task: task.to_string(),
            label: job.label(),
            command: expand_command(template, &job.inputs, &job.outputs),
            cwd,
            env: Vec::new(),
        }
    }
}

/// Substitute `{inputs}` and `{outputs}` in a task's command template.
pub fn expand_command(template: &str, inputs: &[String], outputs: &[String]) -> String {
    template
        .replace("{inputs}", &inputs.join(" "))
        .replace("{outputs}", &outputs.join(" "))
}

/// Quote `s` for a POSIX shell.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Run `spec.command` through the platform shell.
///
/// Stdout is logged at debug level. A non-zero exit is an error carrying
/// the exit code and the tail of stderr. The child is killed if the
/// returned future is dropped, which is how pool termination stops
/// running jobs.
pub async fn run_command(spec: &JobSpec) -> Result<()> {
    info!(task = %spec.task, job = %spec.label, cmd = %spec.command, "starting job process");

    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(&spec.command);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(&spec.command);
        c
    };

    cmd.current_dir(&spec.cwd)
        .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process for job {} of {}", spec.label, spec.task))?;

    if let Some(stdout) = child.stdout.take() {
        let task = spec.task.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(task = %task, "stdout: {}", line);
            }
        });
    }

    let stderr = child.stderr.take().map(|stderr| {
        let task = spec.task.clone();
        tokio::spawn(async move {
            let mut tail = Vec::new();
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(task = %task, "stderr: {}", line);
                if tail.len() == STDERR_TAIL {
                    tail.remove(0);
                }
                tail.push(line);
            }
            tail
        })
    });

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for process of job {} of {}", spec.label, spec.task))?;

    let tail = match stderr {
        Some(handle) => handle.await.unwrap_or_default(),
        None => Vec::new(),
    };

    let code = status.code().unwrap_or(-1);
    debug!(task = %spec.task, job = %spec.label, exit_code = code, "job process exited");

    if !status.success() {
        if tail.is_empty() {
            bail!("command exited with code {code}");
        }
        bail!("command exited with code {code}: {}", tail.join("\n"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_is_expanded_per_job() {
        let cmd = expand_command(
            "cat {inputs} > {outputs}",
            &["a.txt".to_string(), "b.txt".to_string()],
            &["ab.txt".to_string()],
        );
        assert_eq!(cmd, "cat a.txt b.txt > ab.txt");
    }

    #[test]
    fn quoting_survives_single_quotes() {
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_command_reports_code_and_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let spec = JobSpec {
            task: "main::t".to_string(),
            label: "[ -> x]".to_string(),
            command: "echo broken >&2; exit 3".to_string(),
            cwd: dir.path().to_path_buf(),
            env: Vec::new(),
        };

        let err = run_command(&spec).await.unwrap_err().to_string();
        assert!(err.contains("code 3"), "{err}");
        assert!(err.contains("broken"), "{err}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_runs_in_cwd_with_env() {
        let dir = tempfile::tempdir().unwrap();
        let spec = JobSpec {
            task: "main::t".to_string(),
            label: "[ -> out.txt]".to_string(),
            command: "printf %s \"$GREETING\" > out.txt".to_string(),
            cwd: dir.path().to_path_buf(),
            env: vec![("GREETING".to_string(), "hello".to_string())],
        };

        run_command(&spec).await.unwrap();
        let written = std::fs::read_to_string(dir.path().join("out.txt")).unwrap();
        assert_eq!(written, "hello");
    }
}
