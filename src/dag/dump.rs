// src/dag/dump.rs

//! Flat, tab-separated dump of the task graph reachable from a target set.

use std::collections::{HashSet, VecDeque};
use std::io::Write;

use tracing::{debug, warn};

use crate::config::model::PipelineConfig;
use crate::dag::graph::DagGraph;
use crate::errors::Result;

pub const DUMP_HEADER: &str = "function\tactive\toutput_files\tparents";

/// Write the reachable subgraph of `cfg` as a table.
///
/// Traversal is breadth-first from `targets` followed by `forced`, walking
/// towards dependencies. Nodes are marked visited when enqueued, so every
/// task is written at most once even in diamonds and cycles. With no
/// targets at all the terminal tasks of the graph are used.
///
/// Returns the number of task rows written.
pub fn dump_dag<W: Write>(
    cfg: &PipelineConfig,
    targets: &[String],
    forced: &[String],
    out: &mut W,
) -> Result<usize> {
    let graph = DagGraph::from_config(cfg);

    let mut initial: Vec<String> = targets.iter().chain(forced.iter()).cloned().collect();
    if initial.is_empty() {
        initial = graph.terminal_tasks();
    }

    writeln!(out, "{DUMP_HEADER}")?;

    let mut queue: VecDeque<String> = VecDeque::new();
    let mut visited: HashSet<String> = HashSet::new();

    for name in initial {
        if !graph.contains(&name) {
            warn!(task = %name, "dump target is not a task; skipping");
            continue;
        }
        if visited.insert(name.clone()) {
            queue.push_back(name);
        }
    }

    let mut rows = 0;
    while let Some(name) = queue.pop_front() {
        let Some(task) = cfg.task.get(&name) else {
            continue;
        };
        let parents = graph.dependencies_of(&name);

        writeln!(
            out,
            "{}\t{}\t{}\t{}",
            name,
            task.active,
            task.all_outputs().join(","),
            parents.join(",")
        )?;
        rows += 1;

        for parent in parents {
            if visited.insert(parent.clone()) {
                queue.push_back(parent.clone());
            }
        }
    }

    debug!(rows, "dag dump written");
    Ok(rows)
}
