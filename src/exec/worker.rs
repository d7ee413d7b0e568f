// src/exec/worker.rs

//! Pluggable worker abstraction.
//!
//! The scheduler never knows what a task computes: it hands each attempt
//! to a `Worker` and races the returned future against the timeout.
//!
//! - [`ShellWorker`](super::ShellWorker) runs task payloads as shell commands.
//! - [`FnWorker`] adapts an async closure, which is what tests and
//!   embedding code usually want.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::dag::TaskSpec;

/// Future returned by a single work attempt.
///
/// It must be `'static`: on timeout the scheduler stops waiting but the
/// future keeps running detached, since there is no cancellation channel
/// into opaque work.
pub type WorkFuture<O> = Pin<Box<dyn Future<Output = anyhow::Result<O>> + Send + 'static>>;

/// Trait abstracting who performs a task's work.
pub trait Worker: Send + Sync + 'static {
    /// Value a successful attempt produces.
    type Output: Clone + fmt::Debug + Send + Sync + 'static;

    /// Start one attempt of `task`.
    ///
    /// Called once per attempt, so retried tasks see several calls.
    fn perform(&self, task: Arc<TaskSpec>) -> WorkFuture<Self::Output>;
}

/// Worker backed by an async closure.
pub struct FnWorker<F> {
    f: F,
}

impl<F> FnWorker<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> fmt::Debug for FnWorker<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnWorker").finish_non_exhaustive()
    }
}

impl<F, Fut, O> Worker for FnWorker<F>
where
    F: Fn(Arc<TaskSpec>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<O>> + Send + 'static,
    O: Clone + fmt::Debug + Send + Sync + 'static,
{
    type Output = O;

    fn perform(&self, task: Arc<TaskSpec>) -> WorkFuture<O> {
        Box::pin((self.f)(task))
    }
}
