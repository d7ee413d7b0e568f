// src/config/validate.rs

use crate::config::model::{PlanFile, RawPlanFile, TaskConfig};
use crate::dag::DependencyGraph;
use crate::errors::{Result, TaskstageError};

impl TryFrom<RawPlanFile> for PlanFile {
    type Error = TaskstageError;

    fn try_from(raw: RawPlanFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_plan(&raw)?;
        Ok(PlanFile::new_unchecked(raw.config, raw.task))
    }
}

fn validate_raw_plan(plan: &RawPlanFile) -> Result<()> {
    ensure_has_tasks(plan)?;
    validate_global_config(plan)?;
    validate_task_ids(&plan.task)?;
    validate_graph(plan)?;
    Ok(())
}

fn ensure_has_tasks(plan: &RawPlanFile) -> Result<()> {
    if plan.task.is_empty() {
        return Err(TaskstageError::ConfigError(
            "plan must contain at least one [[task]] entry".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(plan: &RawPlanFile) -> Result<()> {
    let cfg = &plan.config;

    if cfg.max_concurrency == 0 {
        return Err(TaskstageError::ConfigError(
            "[config].max_concurrency must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.max_queue_size == 0 {
        return Err(TaskstageError::ConfigError(
            "[config].max_queue_size must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.timeout_ms == 0 {
        return Err(TaskstageError::ConfigError(
            "[config].timeout_ms must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(())
}

fn validate_task_ids(tasks: &[TaskConfig]) -> Result<()> {
    for task in tasks {
        if task.id.trim().is_empty() {
            return Err(TaskstageError::ConfigError(
                "every task needs a non-empty `id`".to_string(),
            ));
        }
        if task.timeout_ms == Some(0) {
            return Err(TaskstageError::ConfigError(format!(
                "task '{}' has `timeout_ms = 0`; it must be >= 1",
                task.id
            )));
        }
        validate_task_ids(&task.subtasks)?;
    }
    Ok(())
}

/// Duplicates, unknown dependencies and cycles are caught by building the
/// same graph `execute_tasks` would.
fn validate_graph(plan: &RawPlanFile) -> Result<()> {
    let tasks: Vec<_> = plan.task.iter().map(TaskConfig::to_task).collect();
    DependencyGraph::build(&tasks)?;
    Ok(())
}
