// src/plan/mod.rs

//! The dry-run plan: rendered from an evaluation by [`printout`], read
//! back by [`parser`] to seed progress tracking.

pub mod parser;
pub mod printout;

pub use parser::{ParsedPlan, parse_plan};
pub use printout::{print_plan, render_plan};
