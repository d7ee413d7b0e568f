// src/dag/mod.rs

//! Task graph representation and planning.
//!
//! - [`task`] holds the caller-facing [`Task`] and the flattened [`TaskSpec`].
//! - [`graph`] builds the index-based dependency graph and rejects cycles.
//! - [`plan`] turns the graph into sequential stages of independent tasks.

pub mod graph;
pub mod plan;
pub mod task;

pub use graph::{DependencyGraph, NodeIndex};
pub use plan::ExecutionPlan;
pub use task::{Task, TaskSpec};
