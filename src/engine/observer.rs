// src/engine/observer.rs

//! Notifications emitted while executing a plan.
//!
//! Notifications are fire-and-forget: nothing an observer does can change
//! scheduling. Observers are injected into the [`Parallelizer`] rather than
//! registered globally.
//!
//! [`Parallelizer`]: crate::engine::Parallelizer

use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, trace};

use crate::errors::TaskError;
use crate::types::TaskId;

/// One method per notification kind. Every method defaults to a no-op.
pub trait SchedulerObserver<O>: Send + Sync {
    fn task_started(&self, _task: &str) {}

    /// Called before each backoff wait. `retry` is 1 for the first retry.
    fn task_retrying(&self, _task: &str, _retry: u32, _backoff: Duration, _error: &TaskError) {}

    fn task_completed(&self, _task: &str, _result: &O, _execution_time: Duration) {}

    fn task_failed(&self, _task: &str, _error: &TaskError, _execution_time: Duration) {}

    fn task_skipped(&self, _task: &str, _blocked_by: &str) {}

    fn shutdown(&self) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl<O> SchedulerObserver<O> for NullObserver {}

/// Observer that reports notifications through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl<O: fmt::Debug> SchedulerObserver<O> for TracingObserver {
    fn task_started(&self, task: &str) {
        debug!(task = %task, "task started");
    }

    // Retries are already logged at warn by the retry controller.
    fn task_retrying(&self, task: &str, retry: u32, backoff: Duration, _error: &TaskError) {
        trace!(task = %task, retry, backoff_ms = backoff.as_millis() as u64, "task retrying");
    }

    fn task_completed(&self, task: &str, result: &O, execution_time: Duration) {
        info!(
            task = %task,
            execution_ms = execution_time.as_millis() as u64,
            ?result,
            "task completed"
        );
    }

    fn task_failed(&self, task: &str, error: &TaskError, execution_time: Duration) {
        error!(
            task = %task,
            error = %error,
            execution_ms = execution_time.as_millis() as u64,
            "task failed"
        );
    }

    fn task_skipped(&self, task: &str, blocked_by: &str) {
        info!(task = %task, blocked_by = %blocked_by, "task skipped");
    }

    fn shutdown(&self) {
        info!("parallelizer shut down");
    }
}

/// Structured form of a notification, as delivered by [`ChannelObserver`].
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerEvent<O> {
    TaskStarted {
        task: TaskId,
    },
    TaskRetrying {
        task: TaskId,
        retry: u32,
        backoff: Duration,
        error: TaskError,
    },
    TaskCompleted {
        task: TaskId,
        result: O,
        execution_time: Duration,
    },
    TaskFailed {
        task: TaskId,
        error: TaskError,
        execution_time: Duration,
    },
    TaskSkipped {
        task: TaskId,
        blocked_by: TaskId,
    },
    Shutdown,
}

impl<O> SchedulerEvent<O> {
    /// Task the event refers to, if any.
    pub fn task(&self) -> Option<&str> {
        match self {
            SchedulerEvent::TaskStarted { task }
            | SchedulerEvent::TaskRetrying { task, .. }
            | SchedulerEvent::TaskCompleted { task, .. }
            | SchedulerEvent::TaskFailed { task, .. }
            | SchedulerEvent::TaskSkipped { task, .. } => Some(task),
            SchedulerEvent::Shutdown => None,
        }
    }
}

/// Forwards notifications over a bounded channel.
///
/// Uses `try_send`, so a slow or absent consumer loses events instead of
/// stalling the scheduler.
#[derive(Debug, Clone)]
pub struct ChannelObserver<O> {
    tx: mpsc::Sender<SchedulerEvent<O>>,
}

impl<O> ChannelObserver<O> {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<SchedulerEvent<O>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    pub fn from_sender(tx: mpsc::Sender<SchedulerEvent<O>>) -> Self {
        Self { tx }
    }

    fn emit(&self, event: SchedulerEvent<O>) {
        if let Err(err) = self.tx.try_send(event) {
            debug!(error = %err, "dropping scheduler event");
        }
    }
}

impl<O: Clone + Send> SchedulerObserver<O> for ChannelObserver<O> {
    fn task_started(&self, task: &str) {
        self.emit(SchedulerEvent::TaskStarted {
            task: task.to_string(),
        });
    }

    fn task_retrying(&self, task: &str, retry: u32, backoff: Duration, error: &TaskError) {
        self.emit(SchedulerEvent::TaskRetrying {
            task: task.to_string(),
            retry,
            backoff,
            error: error.clone(),
        });
    }

    fn task_completed(&self, task: &str, result: &O, execution_time: Duration) {
        self.emit(SchedulerEvent::TaskCompleted {
            task: task.to_string(),
            result: result.clone(),
            execution_time,
        });
    }

    fn task_failed(&self, task: &str, error: &TaskError, execution_time: Duration) {
        self.emit(SchedulerEvent::TaskFailed {
            task: task.to_string(),
            error: error.clone(),
            execution_time,
        });
    }

    fn task_skipped(&self, task: &str, blocked_by: &str) {
        self.emit(SchedulerEvent::TaskSkipped {
            task: task.to_string(),
            blocked_by: blocked_by.to_string(),
        });
    }

    fn shutdown(&self) {
        self.emit(SchedulerEvent::Shutdown);
    }
}
