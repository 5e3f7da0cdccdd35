// src/plan/printout.rs

//! Human-readable dry-run report.
//!
//! This is what `show` prints, and what `make` feeds to the plan parser
//! before dispatching anything, so both sides share the markers in
//! [`crate::progress::patterns`].

use std::io::Write;
use std::path::Path;

use crate::engine::evaluate::{EvaluatedTask, Evaluation};
use crate::errors::Result;
use crate::progress::patterns::{
    MKDIR_JOB_MARKER, NEEDS_UPDATE_MARKER, RUN_SECTION, TASK_HEADER, UP_TO_DATE_MARKER,
    UPTODATE_SECTION,
};

const RULE: &str = "________________________________________";

/// Write the plan for `eval` to `out`.
pub fn print_plan<W: Write>(eval: &Evaluation, out: &mut W) -> Result<()> {
    out.write_all(render_plan(eval).as_bytes())?;
    out.flush()?;
    Ok(())
}

/// Render the plan for `eval` as text.
pub fn render_plan(eval: &Evaluation) -> String {
    let mut text = String::new();

    let to_run: Vec<&EvaluatedTask> = eval.to_run().collect();
    if !to_run.is_empty() {
        text.push_str(&format!("{RULE}\n{RUN_SECTION}:\n\n"));
        for task in to_run {
            if let Some(mkdir_task) = &task.mkdir_task {
                text.push_str(&format!("{TASK_HEADER}{mkdir_task}\n"));
                for dir in &task.mkdir {
                    text.push_str(&format!(
                        "    Job  = [{}] {MKDIR_JOB_MARKER}\n",
                        shown(dir, &eval.workdir)
                    ));
                }
            }
            push_task(&mut text, task);
        }
        text.push('\n');
    }

    let up_to_date: Vec<&EvaluatedTask> = eval.up_to_date().collect();
    if !up_to_date.is_empty() {
        text.push_str(&format!("{RULE}\n{UPTODATE_SECTION}:\n\n"));
        for task in up_to_date {
            push_task(&mut text, task);
        }
        text.push('\n');
    }

    text.push_str(RULE);
    text.push('\n');
    text
}

fn push_task(text: &mut String, task: &EvaluatedTask) {
    text.push_str(&format!("{TASK_HEADER}{}\n", task.qualified));
    for job in &task.jobs {
        text.push_str(&format!("    Job  = {}\n", job.label));
        match &job.reason {
            Some(reason) => text.push_str(&format!("      {NEEDS_UPDATE_MARKER}: {reason}\n")),
            None => text.push_str(&format!("      {UP_TO_DATE_MARKER}\n")),
        }
    }
}

fn shown(dir: &Path, workdir: &Path) -> String {
    dir.strip_prefix(workdir)
        .unwrap_or(dir)
        .display()
        .to_string()
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::engine::evaluate::EvaluatedJob;
    use crate::plan::parse_plan;
    use crate::types::TaskStatus;

    fn job(output: &str, reason: Option<&str>) -> EvaluatedJob {
        EvaluatedJob {
            inputs: vec!["x".to_string()],
            outputs: vec![output.to_string()],
            label: format!("[x -> {output}]"),
            reason: reason.map(str::to_string),
        }
    }

    fn sample() -> Evaluation {
        Evaluation {
            workdir: PathBuf::from("/work"),
            tasks: vec![
                EvaluatedTask {
                    name: "fetch".to_string(),
                    qualified: "main::fetch".to_string(),
                    cmd: "true".to_string(),
                    deps: vec![],
                    mkdir: vec![],
                    mkdir_task: None,
                    jobs: vec![job("x", None)],
                },
                EvaluatedTask {
                    name: "align".to_string(),
                    qualified: "main::align".to_string(),
                    cmd: "true".to_string(),
                    deps: vec!["fetch".to_string()],
                    mkdir: vec![PathBuf::from("/work/bam")],
                    mkdir_task: Some("(mkdir 1) before main::align".to_string()),
                    jobs: vec![
                        job("bam/out1.bam", Some("Missing file [bam/out1.bam]")),
                        job("bam/out2.bam", None),
                    ],
                },
            ],
        }
    }

    #[test]
    fn renders_both_sections() {
        let text = render_plan(&sample());

        assert!(text.contains("Tasks which will be run:"));
        assert!(text.contains("Task = (mkdir 1) before main::align"));
        assert!(text.contains("    Job  = [bam] Make missing directories"));
        assert!(text.contains("      Job needs update: Missing file [bam/out1.bam]"));
        assert!(text.contains("Tasks which are up-to-date:"));

        let run_at = text.find("Task = main::align").unwrap();
        let uptodate_at = text.find("Task = main::fetch").unwrap();
        assert!(run_at < uptodate_at);
    }

    #[test]
    fn rendered_plan_parses_back() {
        let plan = parse_plan(&render_plan(&sample()));

        assert_eq!(plan.tasks.len(), 2);
        let align = plan.tasks.iter().find(|t| t.name == "main::align").unwrap();
        assert_eq!(align.status, TaskStatus::Pending);
        assert_eq!((align.total_jobs, align.completed_jobs), (2, 1));

        let fetch = plan.tasks.iter().find(|t| t.name == "main::fetch").unwrap();
        assert_eq!(fetch.status, TaskStatus::UpToDate);
        assert_eq!(plan.index.owner_of("bam/out2.bam"), Some("main::align"));
    }

    #[test]
    fn empty_evaluation_is_just_a_rule() {
        let eval = Evaluation {
            workdir: PathBuf::from("/work"),
            tasks: vec![],
        };
        assert_eq!(render_plan(&eval), format!("{RULE}\n"));
    }
}
