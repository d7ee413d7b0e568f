// src/engine/retry.rs

//! Retry controller: one task, many attempts.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::dag::TaskSpec;
use crate::engine::observer::SchedulerObserver;
use crate::errors::TaskError;
use crate::exec::Worker;

/// How failed attempts are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; `max_retries + 1` attempts in total.
    pub max_retries: u32,
    pub backoff: Duration,
    /// Double the backoff after every retry (uncapped).
    pub exponential: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Duration::from_millis(1000),
            exponential: true,
        }
    }
}

impl RetryPolicy {
    pub fn no_retries() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry_count + 1`.
    ///
    /// `backoff * 2^retry_count` in exponential mode, `backoff` otherwise.
    /// Saturates instead of overflowing.
    pub fn backoff_for(&self, retry_count: u32) -> Duration {
        if !self.exponential {
            return self.backoff;
        }
        let factor = 2u32.checked_pow(retry_count).unwrap_or(u32::MAX);
        self.backoff.saturating_mul(factor)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Final result of a task plus how many attempts it took.
#[derive(Debug, Clone)]
pub struct RetryOutcome<O> {
    pub result: Result<O, TaskError>,
    pub attempts: u32,
}

/// Run `task` until an attempt succeeds or retries are exhausted.
///
/// Each attempt is spawned and raced against `timeout`. When the timeout
/// wins the attempt counts as failed and its future is left running
/// detached: "timeout" means the scheduler stops waiting, not that the
/// work stops. Only the last attempt's error is returned.
pub async fn run_with_retry<W: Worker>(
    worker: &Arc<W>,
    task: &Arc<TaskSpec>,
    timeout: Duration,
    policy: &RetryPolicy,
    observer: &dyn SchedulerObserver<W::Output>,
) -> RetryOutcome<W::Output> {
    let mut retry_count: u32 = 0;

    loop {
        let attempt = retry_count + 1;
        debug!(task = %task.id, attempt, timeout_ms = timeout.as_millis() as u64, "starting attempt");

        let handle = tokio::spawn(worker.perform(Arc::clone(task)));

        let error = match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(Ok(value))) => {
                return RetryOutcome {
                    result: Ok(value),
                    attempts: attempt,
                };
            }
            Ok(Ok(Err(err))) => TaskError::Failed(format!("{err:#}")),
            Ok(Err(join_err)) => TaskError::Panicked(join_err.to_string()),
            Err(_elapsed) => TaskError::Timeout(timeout),
        };

        if retry_count >= policy.max_retries {
            debug!(task = %task.id, attempts = attempt, error = %error, "retries exhausted");
            return RetryOutcome {
                result: Err(error),
                attempts: attempt,
            };
        }

        let backoff = policy.backoff_for(retry_count);
        retry_count += 1;

        warn!(
            task = %task.id,
            retry = retry_count,
            backoff_ms = backoff.as_millis() as u64,
            error = %error,
            "retrying task"
        );
        observer.task_retrying(&task.id, retry_count, backoff, &error);

        tokio::time::sleep(backoff).await;
    }
}
