// tests/plan_progress.rs

mod common;

use std::path::Path;
use std::time::{Duration, SystemTime};

use pipectl::engine::{ENGINE_MODULE, ForceRun, evaluate};
use pipectl::fs::mock::{MOCK_CWD, MockFileSystem};
use pipectl::plan::{parse_plan, render_plan};
use pipectl::progress::{Decision, LogRecord, ProgressEvent, ProgressTracker};
use pipectl::types::TaskStatus;
use proptest::prelude::*;
use tracing::Level;

fn engine_record(message: &str) -> LogRecord {
    LogRecord::new(Level::INFO, ENGINE_MODULE, message)
}

#[test]
fn worked_example_from_plan_text() {
    common::init_tracing();

    let plan = "\
________________________________________
Tasks which will be run:

Task = align
    Job  = [x -> out1.bam]
      Job needs update: Missing file [out1.bam]
    Job  = [x -> out2.bam]
      Job up-to-date
";
    let parsed = parse_plan(plan);
    assert_eq!(parsed.tasks[0].total_jobs, 2);
    assert_eq!(parsed.tasks[0].completed_jobs, 1);
    assert_eq!(parsed.index.owner_of("out1.bam"), Some("align"));

    let mut tracker = ProgressTracker::with_sink(parsed, Vec::<ProgressEvent>::new());
    let mut record = engine_record("Job  = [x -> out1.bam] completed");
    assert_eq!(tracker.apply_record(&mut record), Decision::Keep);

    let state = tracker.task("align").unwrap();
    assert_eq!(state.completed_jobs, 2);
    assert_eq!(state.completed_percent(), 100.0);
    assert_eq!(
        tracker.sink().as_slice(),
        &[ProgressEvent {
            task: "align".to_string(),
            task_status: TaskStatus::Pending,
            task_total: 2,
            task_completed: 2,
            task_completed_percent: 100.0,
        }]
    );

    let mut unknown = engine_record("Job  = [x -> nowhere.bam] completed");
    assert_eq!(tracker.apply_record(&mut unknown), Decision::Drop);
    assert_eq!(tracker.task("align").unwrap().completed_jobs, 2);
    assert_eq!(tracker.sink().len(), 1);
}

#[test]
fn evaluated_plan_drives_tracker_to_completion() {
    let cfg = common::pipeline(
        r#"
[task.split]
cmd = "split {inputs}"
[[task.split.job]]
inputs = ["reads.fq"]
outputs = ["chunks/a.fq"]
[[task.split.job]]
inputs = ["reads.fq"]
outputs = ["chunks/b.fq"]

[task.merge]
cmd = "cat {inputs} > {outputs}"
after = ["split"]
inputs = ["chunks/a.fq", "chunks/b.fq"]
outputs = ["merged.fq"]
"#,
    );

    let fs = MockFileSystem::new();
    fs.add_file("reads.fq", 10, SystemTime::UNIX_EPOCH + Duration::from_secs(5));

    let eval = evaluate(&cfg, Path::new(MOCK_CWD), &[], &ForceRun::None, &fs).unwrap();
    let text = render_plan(&eval);
    let mut tracker = ProgressTracker::with_sink(parse_plan(&text), Vec::new());

    for message in [
        "Task enters queue = main::split",
        "Job  = [reads.fq -> chunks/a.fq] completed",
        "Job  = [reads.fq -> chunks/b.fq] completed",
        "Completed Task = main::split",
        "Task enters queue = main::merge",
        "Job  = [chunks/a.fq, chunks/b.fq -> merged.fq] completed",
        "Completed Task = main::merge",
    ] {
        let mut record = engine_record(message);
        assert_eq!(tracker.apply_record(&mut record), Decision::Keep, "{message}");
        assert!(record.progress.is_some(), "{message}");
    }

    for name in ["main::split", "main::merge"] {
        let state = tracker.task(name).unwrap();
        assert_eq!(state.status, TaskStatus::Completed);
        assert_eq!(state.completed_jobs, state.total_jobs);
    }
    let last = tracker.sink().last().unwrap();
    assert_eq!(last.task, "merge");
    assert_eq!(last.task_completed_percent, 100.0);
}

#[test]
fn records_from_other_modules_are_never_touched() {
    let mut tracker = ProgressTracker::from_plan("Tasks which will be run:\nTask = a\n");
    let mut record = LogRecord::new(Level::WARN, "some::library", "Completed Task = a");
    assert_eq!(tracker.apply_record(&mut record), Decision::Keep);
    assert!(record.progress.is_none());
    assert_eq!(tracker.task("a").unwrap().status, TaskStatus::Pending);
}

proptest! {
    #[test]
    fn completion_only_moves_forward(
        needs_update in proptest::collection::vec(any::<bool>(), 1..8),
        picks in proptest::collection::vec(0usize..16, 0..24),
    ) {
        let mut plan = String::from("Tasks which will be run:\nTask = main::t\n");
        for (i, needs) in needs_update.iter().enumerate() {
            plan.push_str(&format!("    Job  = [in -> out{i}]\n"));
            if *needs {
                plan.push_str(&format!("      Job needs update: Missing file [out{i}]\n"));
            } else {
                plan.push_str("      Job up-to-date\n");
            }
        }

        let mut tracker = ProgressTracker::with_sink(parse_plan(&plan), Vec::new());
        let start = tracker.task("main::t").unwrap().completed_jobs;
        let mut previous = start;

        for pick in &picks {
            let mut record = engine_record(&format!("Job  = [in -> out{pick}] completed"));
            let decision = tracker.apply_record(&mut record);
            let now = tracker.task("main::t").unwrap().completed_jobs;

            if *pick < needs_update.len() {
                prop_assert_eq!(decision, Decision::Keep);
                prop_assert_eq!(now, previous + 1);
            } else {
                prop_assert_eq!(decision, Decision::Drop);
                prop_assert_eq!(now, previous);
            }
            previous = now;
        }

        let percents: Vec<f64> = tracker
            .sink()
            .iter()
            .map(|e| e.task_completed_percent)
            .collect();
        prop_assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    }
}
