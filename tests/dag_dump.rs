// tests/dag_dump.rs

mod common;

use pipectl::dag::{DUMP_HEADER, dump_dag};

fn dump(toml_text: &str, targets: &[&str], forced: &[&str]) -> (usize, Vec<String>) {
    let cfg = common::pipeline(toml_text);
    let targets: Vec<String> = targets.iter().map(|s| s.to_string()).collect();
    let forced: Vec<String> = forced.iter().map(|s| s.to_string()).collect();

    let mut out = Vec::new();
    let rows = dump_dag(&cfg, &targets, &forced, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    (rows, text.lines().map(|l| l.to_string()).collect())
}

#[test]
fn cycle_emits_each_task_once() {
    let (rows, lines) = dump(
        r#"
[task.A]
cmd = "echo A"
after = ["B"]
outputs = ["a.txt"]

[task.B]
cmd = "echo B"
after = ["A"]
outputs = ["b.txt"]
"#,
        &["A"],
        &[],
    );

    assert_eq!(rows, 2);
    assert_eq!(
        lines,
        vec![
            DUMP_HEADER.to_string(),
            "A\ttrue\ta.txt\tB".to_string(),
            "B\ttrue\tb.txt\tA".to_string(),
        ]
    );
}

#[test]
fn diamond_is_walked_breadth_first_once() {
    let (rows, lines) = dump(
        r#"
[task.root]
cmd = "true"
outputs = ["r"]

[task.left]
cmd = "true"
after = ["root"]
outputs = ["l"]

[task.right]
cmd = "true"
after = ["root"]
active = false
outputs = ["r1", "r2"]

[task.top]
cmd = "true"
after = ["left", "right"]
"#,
        &["top"],
        &[],
    );

    assert_eq!(rows, 4);
    assert_eq!(lines[1], "top\ttrue\t\tleft,right");
    assert_eq!(lines[2], "left\ttrue\tl\troot");
    assert_eq!(lines[3], "right\tfalse\tr1,r2\troot");
    assert_eq!(lines[4], "root\ttrue\tr\t");
}

#[test]
fn forced_targets_follow_regular_targets() {
    let (rows, lines) = dump(
        r#"
[task.a]
cmd = "true"

[task.b]
cmd = "true"
"#,
        &["b"],
        &["a", "b"],
    );

    assert_eq!(rows, 2);
    assert!(lines[1].starts_with("b\t"));
    assert!(lines[2].starts_with("a\t"));
}

#[test]
fn unknown_targets_are_skipped_and_empty_means_terminal_tasks() {
    let toml_text = r#"
[task.a]
cmd = "true"

[task.b]
cmd = "true"
after = ["a"]

[task.c]
cmd = "true"
"#;

    let (rows, lines) = dump(toml_text, &["missing"], &[]);
    assert_eq!(rows, 0);
    assert_eq!(lines, vec![DUMP_HEADER.to_string()]);

    let (rows, lines) = dump(toml_text, &[], &[]);
    assert_eq!(rows, 3);
    assert!(lines[1].starts_with("b\t"));
    assert!(lines[2].starts_with("c\t"));
    assert!(lines[3].starts_with("a\t"));
}
