// src/dag/graph.rs

use std::collections::{BTreeMap, BTreeSet};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::PipelineConfig;
use crate::errors::{PipectlError, Result};

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone)]
struct DagNode {
    /// Direct dependencies: tasks that must complete before this one can run.
    deps: Vec<String>,
    /// Direct dependents: tasks that depend on this one.
    dependents: Vec<String>,
}

/// In-memory task graph keyed by task name.
///
/// Cycles are representable: validation only checks that references exist,
/// and [`DagGraph::execution_order`] is where a cycle becomes an error.
#[derive(Debug, Clone)]
pub struct DagGraph {
    nodes: BTreeMap<String, DagNode>,
}

impl DagGraph {
    /// Build the graph from a validated [`PipelineConfig`].
    pub fn from_config(cfg: &PipelineConfig) -> Self {
        Self::from_edges(
            cfg.task
                .iter()
                .map(|(name, task)| (name.clone(), task.after.clone())),
        )
    }

    /// Build the graph from `(task, deps)` pairs. Dependencies that are not
    /// themselves listed as tasks are ignored.
    pub fn from_edges(edges: impl IntoIterator<Item = (String, Vec<String>)>) -> Self {
        let mut nodes: BTreeMap<String, DagNode> = edges
            .into_iter()
            .map(|(name, deps)| {
                (
                    name,
                    DagNode {
                        deps,
                        dependents: Vec::new(),
                    },
                )
            })
            .collect();

        let task_names: Vec<String> = nodes.keys().cloned().collect();
        for task_name in task_names {
            let deps = nodes
                .get(&task_name)
                .map(|n| n.deps.clone())
                .unwrap_or_default();

            for dep in deps {
                if let Some(dep_node) = nodes.get_mut(&dep) {
                    dep_node.dependents.push(task_name.clone());
                }
            }
        }

        Self { nodes }
    }

    /// Return all task names, sorted.
    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|s| s.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Immediate dependencies of a task (the tasks listed in its `after`).
    pub fn dependencies_of(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a task (tasks that list this one in their `after`).
    pub fn dependents_of(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Tasks nothing else depends on.
    pub fn terminal_tasks(&self) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.dependents.is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// `targets` plus all their transitive dependencies.
    ///
    /// Unknown target names yield [`PipectlError::TaskNotFound`].
    pub fn upstream_closure(&self, targets: &[String]) -> Result<BTreeSet<String>> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<String> = Vec::new();

        for target in targets {
            if !self.contains(target) {
                return Err(PipectlError::TaskNotFound(target.clone()));
            }
            stack.push(target.clone());
        }

        while let Some(name) = stack.pop() {
            if !seen.insert(name.clone()) {
                continue;
            }
            stack.extend(self.dependencies_of(&name).iter().cloned());
        }

        Ok(seen)
    }

    /// Topological order (dependencies first) of the given subset.
    pub fn execution_order(&self, subset: &BTreeSet<String>) -> Result<Vec<String>> {
        // Edge direction: dep -> task
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

        for name in subset {
            graph.add_node(name.as_str());
        }
        for name in subset {
            for dep in self.dependencies_of(name) {
                if subset.contains(dep) {
                    graph.add_edge(dep.as_str(), name.as_str(), ());
                }
            }
        }

        match toposort(&graph, None) {
            Ok(order) => Ok(order.into_iter().map(|s| s.to_string()).collect()),
            Err(cycle) => Err(PipectlError::DagCycle(format!(
                "cycle detected in task DAG involving task '{}'",
                cycle.node_id()
            ))),
        }
    }
}
