// src/dag/plan.rs

//! Layered topological decomposition of a [`DependencyGraph`] into stages.

use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use crate::dag::graph::{DependencyGraph, NodeIndex};
use crate::errors::{Result, TaskstageError};
use crate::types::TaskId;

/// Rough per-stage duration used for [`ExecutionPlan::estimated_duration`].
pub const STAGE_DURATION_ESTIMATE: Duration = Duration::from_secs(1);

/// Ordered stages plus reporting-only diagnostics.
///
/// Every node of the graph appears in exactly one stage, and for every
/// edge `u -> v` the stage of `u` comes strictly before the stage of `v`.
/// Each task sits in the earliest stage its prerequisites allow.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    stages: Vec<Vec<NodeIndex>>,
    stage_ids: Vec<Vec<TaskId>>,
    stage_by_id: HashMap<TaskId, usize>,
    critical_path: Vec<TaskId>,
    parallelism_factor: f64,
}

impl ExecutionPlan {
    /// Kahn-style layered sort over a copy of the graph's in-degrees.
    pub fn from_graph(graph: &DependencyGraph) -> Result<Self> {
        let n = graph.len();
        let mut in_degree: Vec<usize> = (0..n).map(|i| graph.in_degree(i)).collect();
        let mut processed = vec![false; n];
        let mut processed_count = 0;
        let mut stages: Vec<Vec<NodeIndex>> = Vec::new();

        while processed_count < n {
            let stage: Vec<NodeIndex> = (0..n)
                .filter(|&i| !processed[i] && in_degree[i] == 0)
                .collect();

            if stage.is_empty() {
                return Err(TaskstageError::PlanningFailed(format!(
                    "{} task(s) never became ready; possible circular dependency",
                    n - processed_count
                )));
            }

            for &idx in &stage {
                processed[idx] = true;
                processed_count += 1;
                for &dependent in graph.dependents_of(idx) {
                    in_degree[dependent] -= 1;
                }
            }

            debug!(stage = stages.len(), tasks = stage.len(), "planned stage");
            stages.push(stage);
        }

        let stage_ids: Vec<Vec<TaskId>> = stages
            .iter()
            .map(|s| s.iter().map(|&i| graph.node(i).id.clone()).collect())
            .collect();

        let stage_by_id = stage_ids
            .iter()
            .enumerate()
            .flat_map(|(no, ids)| ids.iter().map(move |id| (id.clone(), no)))
            .collect();

        let critical_path = critical_path(graph, &stages);
        let parallelism_factor = parallelism_factor(&stages);

        Ok(Self {
            stages,
            stage_ids,
            stage_by_id,
            critical_path,
            parallelism_factor,
        })
    }

    /// Stages as graph indices, in execution order.
    pub fn stages(&self) -> &[Vec<NodeIndex>] {
        &self.stages
    }

    /// Stages as task ids, in execution order.
    pub fn stage_ids(&self) -> &[Vec<TaskId>] {
        &self.stage_ids
    }

    /// Zero-based stage number of a task.
    pub fn stage_of(&self, id: &str) -> Option<usize> {
        self.stage_by_id.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn task_count(&self) -> usize {
        self.stage_by_id.len()
    }

    /// Longest dependency chain by edge count. Diagnostic only.
    pub fn critical_path(&self) -> &[TaskId] {
        &self.critical_path
    }

    /// Widest stage relative to the mean stage width.
    pub fn parallelism_factor(&self) -> f64 {
        self.parallelism_factor
    }

    pub fn estimated_duration(&self) -> Duration {
        STAGE_DURATION_ESTIMATE * self.stages.len() as u32
    }
}

/// Relax edges in topological order (stage order is one), tracking the
/// longest incoming path and its predecessor, then walk back from the
/// farthest node.
fn critical_path(graph: &DependencyGraph, stages: &[Vec<NodeIndex>]) -> Vec<TaskId> {
    let n = graph.len();
    if n == 0 {
        return Vec::new();
    }

    let mut distance = vec![0usize; n];
    let mut predecessor: Vec<Option<NodeIndex>> = vec![None; n];

    for &u in stages.iter().flatten() {
        for &v in graph.dependents_of(u) {
            if distance[u] + 1 > distance[v] {
                distance[v] = distance[u] + 1;
                predecessor[v] = Some(u);
            }
        }
    }

    let end = (0..n).fold(0, |best, i| if distance[i] > distance[best] { i } else { best });

    let mut path = Vec::with_capacity(distance[end] + 1);
    let mut current = Some(end);
    while let Some(idx) = current {
        path.push(graph.node(idx).id.clone());
        current = predecessor[idx];
    }
    path.reverse();
    path
}

fn parallelism_factor(stages: &[Vec<NodeIndex>]) -> f64 {
    if stages.is_empty() {
        return 0.0;
    }

    let total: usize = stages.iter().map(Vec::len).sum();
    let widest = stages.iter().map(Vec::len).max().unwrap_or(0);
    widest as f64 / (total as f64 / stages.len() as f64)
}
