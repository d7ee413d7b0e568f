#![allow(dead_code)]

use taskstage::config::{ConfigSection, PlanFile, RawPlanFile, TaskConfig};
use taskstage::types::FailurePolicy;

/// Builder for `PlanFile` to simplify test setup.
pub struct PlanFileBuilder {
    plan: RawPlanFile,
}

impl PlanFileBuilder {
    pub fn new() -> Self {
        Self {
            plan: RawPlanFile {
                config: ConfigSection::default(),
                task: Vec::new(),
            },
        }
    }

    pub fn with_task(mut self, task: TaskConfig) -> Self {
        self.plan.task.push(task);
        self
    }

    pub fn max_concurrency(mut self, n: usize) -> Self {
        self.plan.config.max_concurrency = n;
        self
    }

    pub fn priority_queues(mut self, enabled: bool) -> Self {
        self.plan.config.priority_queues = enabled;
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.plan.config.failure_policy = policy;
        self
    }

    pub fn retries(mut self, max_retries: u32, backoff_ms: u64, exponential: bool) -> Self {
        self.plan.config.retry.max_retries = max_retries;
        self.plan.config.retry.backoff_ms = backoff_ms;
        self.plan.config.retry.exponential = exponential;
        self
    }

    pub fn raw(self) -> RawPlanFile {
        self.plan
    }

    pub fn build(self) -> PlanFile {
        PlanFile::try_from(self.plan).expect("Failed to build valid plan from builder")
    }
}

impl Default for PlanFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            task: TaskConfig {
                id: id.to_string(),
                cmd: format!("echo {id}"),
                priority: None,
                depends_on: Vec::new(),
                timeout_ms: None,
                subtasks: Vec::new(),
            },
        }
    }

    pub fn cmd(mut self, cmd: &str) -> Self {
        self.task.cmd = cmd.to_string();
        self
    }

    pub fn priority(mut self, priority: &str) -> Self {
        self.task.priority = Some(priority.to_string());
        self
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.depends_on.push(dep.to_string());
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.task.timeout_ms = Some(ms);
        self
    }

    pub fn subtask(mut self, sub: TaskConfig) -> Self {
        self.task.subtasks.push(sub);
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}
