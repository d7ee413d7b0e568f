// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Canonical task identity type used throughout the crate.
pub type TaskId = String;

/// Ordered priority levels. Each level owns its own lane when priority
/// partitioning is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl Priority {
    /// All levels, lowest first.
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Normal,
        Priority::High,
        Priority::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            other => Err(format!(
                "invalid priority: {other} (expected \"low\", \"normal\", \"high\" or \"critical\")"
            )),
        }
    }
}

/// Lifecycle of a task within one `execute_tasks` invocation.
///
/// Retries happen inside `Running`; a task settles exactly once. A task is
/// `Running` from dispatch until it settles, so a finished report only holds
/// `Pending` (never dispatched) and settled statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    /// Never dispatched because an upstream task failed
    /// (only under [`FailurePolicy::SkipDependents`]).
    Skipped,
}

impl TaskStatus {
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Skipped
        )
    }
}

/// Load-balancing strategy. Accepted and carried through configuration but
/// not consulted by the current routing algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoadBalancing {
    RoundRobin,
    #[default]
    LeastLoaded,
    Weighted,
}

/// What happens to dependents of a task that settled as failed.
///
/// - `Continue`: dependents are still dispatched (best effort).
/// - `SkipDependents`: dependents, and their dependents, are settled as
///   `Skipped` without running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    #[default]
    Continue,
    SkipDependents,
}
