// src/errors.rs

//! Crate-wide error types.
//!
//! [`TaskstageError`] covers everything that rejects a whole invocation
//! (bad plan files, graph errors). [`TaskError`] is the settled error of a
//! single task and never escapes `execute_tasks`.

use std::time::Duration;

use thiserror::Error;

use crate::types::TaskId;

#[derive(Error, Debug)]
pub enum TaskstageError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Duplicate task id: {0}")]
    DuplicateTask(TaskId),

    #[error("Task '{task}' depends on unknown task '{dependency}'")]
    DanglingDependency { task: TaskId, dependency: TaskId },

    #[error("Circular dependency detected in task graph: {}", .0.join(" -> "))]
    CircularDependency(Vec<TaskId>),

    #[error("Unable to create execution plan: {0}")]
    PlanningFailed(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Terminal error of a single task, after all retries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("task timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Failed(String),

    #[error("task attempt panicked: {0}")]
    Panicked(String),

    #[error("scheduler shut down before the task was admitted")]
    Shutdown,
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TaskstageError>;
