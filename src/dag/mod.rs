// src/dag/mod.rs

//! Task graph representation and inspection.
//!
//! - [`graph`] holds the task graph (possibly cyclic) and orders subsets of it.
//! - [`dump`] writes the flat dependency table used by the `state` action.

pub mod dump;
pub mod graph;

pub use dump::{DUMP_HEADER, dump_dag};
pub use graph::DagGraph;
