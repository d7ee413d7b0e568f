// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::dag::Task;
use crate::engine::{RetryPolicy, SchedulerConfig};
use crate::types::{FailurePolicy, LoadBalancing, Priority};

/// A plan file as read from TOML, before validation.
///
/// ```toml
/// [config]
/// max_concurrency = 4
///
/// [[task]]
/// id = "fetch"
/// cmd = "git fetch"
///
/// [[task]]
/// id = "build"
/// cmd = "cargo build"
/// priority = "high"
/// depends_on = ["fetch"]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawPlanFile {
    #[serde(default)]
    pub config: ConfigSection,

    /// Top-level tasks from `[[task]]`, in file order.
    #[serde(default)]
    pub task: Vec<TaskConfig>,
}

/// `[config]` section. Every field falls back to the scheduler default.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConfigSection {
    pub max_concurrency: usize,
    pub max_queue_size: usize,
    pub priority_queues: bool,
    pub load_balancing: LoadBalancing,
    pub timeout_ms: u64,
    pub failure_policy: FailurePolicy,
    pub retry: RetrySection,
}

impl Default for ConfigSection {
    fn default() -> Self {
        let defaults = SchedulerConfig::default();
        Self {
            max_concurrency: defaults.max_concurrency,
            max_queue_size: defaults.max_queue_size,
            priority_queues: defaults.priority_queues,
            load_balancing: defaults.load_balancing,
            timeout_ms: defaults.timeout.as_millis() as u64,
            failure_policy: defaults.failure_policy,
            retry: RetrySection::default(),
        }
    }
}

/// `[config.retry]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_retries: u32,
    pub backoff_ms: u64,
    pub exponential: bool,
}

impl Default for RetrySection {
    fn default() -> Self {
        let defaults = RetryPolicy::default();
        Self {
            max_retries: defaults.max_retries,
            backoff_ms: defaults.backoff.as_millis() as u64,
            exponential: defaults.exponential,
        }
    }
}

/// `[[task]]` entry, or a nested `[[task.subtasks]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    pub id: String,

    /// Shell command run by the CLI worker.
    #[serde(default)]
    pub cmd: String,

    /// Kept as a string: unknown levels are routed as `normal`.
    #[serde(default)]
    pub priority: Option<String>,

    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Per-attempt timeout overriding `[config].timeout_ms`.
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    #[serde(default)]
    pub subtasks: Vec<TaskConfig>,
}

impl TaskConfig {
    /// Priority level, falling back to `normal` for unknown strings.
    pub fn effective_priority(&self) -> Priority {
        let Some(raw) = self.priority.as_deref() else {
            return Priority::default();
        };
        match raw.parse::<Priority>() {
            Ok(priority) => priority,
            Err(err) => {
                warn!(task = %self.id, %err, "unrecognised priority; using normal");
                Priority::default()
            }
        }
    }

    pub fn to_task(&self) -> Task {
        let mut task = Task::new(self.id.clone())
            .with_priority(self.effective_priority())
            .with_payload(self.cmd.clone());

        for dep in &self.depends_on {
            task = task.depends_on(dep.clone());
        }
        if let Some(ms) = self.timeout_ms {
            task = task.with_timeout(Duration::from_millis(ms));
        }
        for sub in &self.subtasks {
            task = task.with_subtask(sub.to_task());
        }
        task
    }
}

/// A validated plan file.
///
/// Only constructed through `TryFrom<RawPlanFile>`, so holding one means
/// the task set builds into an acyclic graph.
#[derive(Debug, Clone)]
pub struct PlanFile {
    config: ConfigSection,
    tasks: Vec<TaskConfig>,
}

impl PlanFile {
    pub(crate) fn new_unchecked(config: ConfigSection, tasks: Vec<TaskConfig>) -> Self {
        Self { config, tasks }
    }

    pub fn config_section(&self) -> &ConfigSection {
        &self.config
    }

    pub fn task_configs(&self) -> &[TaskConfig] {
        &self.tasks
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        let cfg = &self.config;
        SchedulerConfig {
            max_concurrency: cfg.max_concurrency,
            max_queue_size: cfg.max_queue_size,
            priority_queues: cfg.priority_queues,
            load_balancing: cfg.load_balancing,
            timeout: Duration::from_millis(cfg.timeout_ms),
            retry: RetryPolicy {
                max_retries: cfg.retry.max_retries,
                backoff: Duration::from_millis(cfg.retry.backoff_ms),
                exponential: cfg.retry.exponential,
            },
            failure_policy: cfg.failure_policy,
        }
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.tasks.iter().map(TaskConfig::to_task).collect()
    }
}
