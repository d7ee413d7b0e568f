// src/engine/report.rs

//! Per-invocation results.

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use crate::dag::{ExecutionPlan, TaskSpec};
use crate::engine::metrics::ExecutionMetrics;
use crate::errors::TaskError;
use crate::types::{Priority, TaskId, TaskStatus};

/// Scheduler-owned state of one task.
#[derive(Debug, Clone)]
pub struct TaskRecord<O> {
    pub id: TaskId,
    pub priority: Priority,
    pub parent: Option<TaskId>,
    pub status: TaskStatus,
    /// Settled value: the result, or the last attempt's error.
    /// `None` while pending and for skipped tasks.
    pub outcome: Option<Result<O, TaskError>>,
    pub attempts: u32,
    pub started_at: Option<SystemTime>,
    pub ended_at: Option<SystemTime>,
    pub execution_time: Option<Duration>,
}

impl<O> TaskRecord<O> {
    pub(crate) fn pending(spec: &TaskSpec) -> Self {
        Self {
            id: spec.id.clone(),
            priority: spec.priority,
            parent: spec.parent.clone(),
            status: TaskStatus::Pending,
            outcome: None,
            attempts: 0,
            started_at: None,
            ended_at: None,
            execution_time: None,
        }
    }

    pub fn result(&self) -> Option<&O> {
        self.outcome.as_ref().and_then(|o| o.as_ref().ok())
    }

    pub fn error(&self) -> Option<&TaskError> {
        self.outcome.as_ref().and_then(|o| o.as_ref().err())
    }
}

/// Everything one `execute_tasks` call produced.
///
/// A failed task's entry carries its error; use [`TaskRecord::status`] to
/// tell success from failure.
#[derive(Debug, Clone)]
pub struct ExecutionReport<O> {
    records: Vec<TaskRecord<O>>,
    index: HashMap<TaskId, usize>,
    stages: Vec<Vec<TaskId>>,
    critical_path: Vec<TaskId>,
    parallelism_factor: f64,
    metrics: ExecutionMetrics,
}

impl<O> ExecutionReport<O> {
    pub(crate) fn new(
        records: Vec<TaskRecord<O>>,
        plan: &ExecutionPlan,
        metrics: ExecutionMetrics,
    ) -> Self {
        let index = records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id.clone(), i))
            .collect();

        Self {
            records,
            index,
            stages: plan.stage_ids().to_vec(),
            critical_path: plan.critical_path().to_vec(),
            parallelism_factor: plan.parallelism_factor(),
            metrics,
        }
    }

    pub fn get(&self, id: &str) -> Option<&TaskRecord<O>> {
        self.index.get(id).map(|&i| &self.records[i])
    }

    pub fn status_of(&self, id: &str) -> Option<TaskStatus> {
        self.get(id).map(|r| r.status)
    }

    pub fn outcome(&self, id: &str) -> Option<&Result<O, TaskError>> {
        self.get(id).and_then(|r| r.outcome.as_ref())
    }

    /// All records, parents before their subtasks, in submission order.
    pub fn records(&self) -> impl Iterator<Item = &TaskRecord<O>> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Task id to settled value, for every task that settled with one.
    pub fn results(&self) -> HashMap<TaskId, Result<O, TaskError>>
    where
        O: Clone,
    {
        self.records
            .iter()
            .filter_map(|r| r.outcome.clone().map(|o| (r.id.clone(), o)))
            .collect()
    }

    /// True only if every task completed.
    pub fn all_completed(&self) -> bool {
        self.records.iter().all(|r| r.status == TaskStatus::Completed)
    }

    pub fn ids_with_status(&self, status: TaskStatus) -> Vec<&str> {
        self.records
            .iter()
            .filter(|r| r.status == status)
            .map(|r| r.id.as_str())
            .collect()
    }

    pub fn stages(&self) -> &[Vec<TaskId>] {
        &self.stages
    }

    pub fn critical_path(&self) -> &[TaskId] {
        &self.critical_path
    }

    pub fn parallelism_factor(&self) -> f64 {
        self.parallelism_factor
    }

    pub fn metrics(&self) -> &ExecutionMetrics {
        &self.metrics
    }
}
