// src/engine/mod.rs

//! Execution engine.
//!
//! - [`lanes`]: priority lanes bounding concurrency per priority level
//! - [`retry`]: per-task retry loop with timeouts and backoff
//! - [`executor`]: the [`Parallelizer`], running a plan stage by stage
//! - [`observer`]: lifecycle notifications
//! - [`metrics`] and [`report`]: what an invocation produced

use std::time::Duration;

use crate::types::{FailurePolicy, LoadBalancing};

pub mod executor;
pub mod lanes;
pub mod metrics;
pub mod observer;
pub mod report;
pub mod retry;

pub use executor::{ActiveTask, Parallelizer};
pub use lanes::{LaneRouter, LaneStatus};
pub use metrics::{ExecutionMetrics, MetricsRecorder};
pub use observer::{ChannelObserver, NullObserver, SchedulerEvent, SchedulerObserver, TracingObserver};
pub use report::{ExecutionReport, TaskRecord};
pub use retry::{RetryOutcome, RetryPolicy};

/// Scheduler-wide settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// Global concurrency ceiling; split across lanes when
    /// `priority_queues` is set.
    pub max_concurrency: usize,
    /// Advisory only: a stage larger than this is logged, never rejected.
    pub max_queue_size: usize,
    pub priority_queues: bool,
    pub load_balancing: LoadBalancing,
    /// Per-attempt timeout for tasks without their own.
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub failure_policy: FailurePolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 10,
            max_queue_size: 1000,
            priority_queues: true,
            load_balancing: LoadBalancing::default(),
            timeout: Duration::from_millis(60_000),
            retry: RetryPolicy::default(),
            failure_policy: FailurePolicy::default(),
        }
    }
}
