// src/dag/task.rs

//! Task input type and the flattened record the scheduler hands to workers.

use std::time::Duration;

use crate::types::{Priority, TaskId};

/// A unit of work as submitted by the caller.
///
/// `payload` is opaque to the scheduler; only the [`Worker`] interprets it
/// (the shell worker runs it as a command line).
///
/// [`Worker`]: crate::exec::Worker
#[derive(Debug, Clone, Default)]
pub struct Task {
    pub id: TaskId,
    pub priority: Priority,
    /// Tasks that must settle before this one may start.
    pub depends_on: Vec<TaskId>,
    /// Nested tasks; each is implicitly dependent on this task.
    pub subtasks: Vec<Task>,
    /// Per-attempt timeout override.
    pub timeout: Option<Duration>,
    pub payload: String,
}

impl Task {
    pub fn new(id: impl Into<TaskId>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn depends_on(mut self, dep: impl Into<TaskId>) -> Self {
        self.depends_on.push(dep.into());
        self
    }

    pub fn with_subtask(mut self, subtask: Task) -> Self {
        self.subtasks.push(subtask);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = payload.into();
        self
    }
}

/// Flattened, immutable view of a task, shared with workers via `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub id: TaskId,
    pub priority: Priority,
    pub depends_on: Vec<TaskId>,
    /// Containing task, for subtasks.
    pub parent: Option<TaskId>,
    pub timeout: Option<Duration>,
    pub payload: String,
}

impl TaskSpec {
    pub fn from_task(task: &Task, parent: Option<&TaskId>) -> Self {
        Self {
            id: task.id.clone(),
            priority: task.priority,
            depends_on: task.depends_on.clone(),
            parent: parent.cloned(),
            timeout: task.timeout,
            payload: task.payload.clone(),
        }
    }

    /// The per-attempt timeout, falling back to the global default.
    pub fn effective_timeout(&self, default: Duration) -> Duration {
        self.timeout.unwrap_or(default)
    }
}
