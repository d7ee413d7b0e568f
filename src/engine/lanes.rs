// src/engine/lanes.rs

//! Priority lanes.
//!
//! Each lane is a semaphore bounding how many of its tasks may be in
//! flight at once. Admission is by concurrency only: there is no queue
//! length limit, a task simply waits for a permit.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::errors::TaskError;
use crate::types::Priority;

/// Point-in-time view of one lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaneStatus {
    pub priority: Priority,
    pub capacity: usize,
    /// Tasks waiting for admission.
    pub waiting: usize,
    /// Tasks currently holding a permit.
    pub running: usize,
}

/// A priority-scoped, concurrency-bounded execution channel.
///
/// A slot is held by a task from admission until it settles, across all of
/// its attempts. An attempt abandoned on timeout is not counted: it keeps
/// running detached while the retry runs in the same slot, so more work
/// futures than `capacity` may be alive at once.
#[derive(Debug)]
pub struct Lane {
    priority: Priority,
    capacity: usize,
    semaphore: Arc<Semaphore>,
    waiting: AtomicUsize,
    running: Arc<AtomicUsize>,
}

impl Lane {
    fn new(priority: Priority, capacity: usize) -> Self {
        Self {
            priority,
            capacity,
            semaphore: Arc::new(Semaphore::new(capacity)),
            waiting: AtomicUsize::new(0),
            running: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Wait until the lane has room for one more task.
    ///
    /// Fails with [`TaskError::Shutdown`] if the lane is closed while
    /// waiting (or was already closed).
    pub async fn admit(&self) -> Result<LanePermit, TaskError> {
        let permit = {
            let _waiting = CounterGuard::enter(&self.waiting);
            Arc::clone(&self.semaphore)
                .acquire_owned()
                .await
                .map_err(|_| TaskError::Shutdown)?
        };

        self.running.fetch_add(1, Ordering::SeqCst);
        Ok(LanePermit {
            _permit: permit,
            running: Arc::clone(&self.running),
        })
    }

    pub fn status(&self) -> LaneStatus {
        LaneStatus {
            priority: self.priority,
            capacity: self.capacity,
            waiting: self.waiting.load(Ordering::SeqCst),
            running: self.running.load(Ordering::SeqCst),
        }
    }

    fn close(&self) {
        self.semaphore.close();
    }
}

/// Held while a task runs; frees its lane slot on drop.
#[derive(Debug)]
pub struct LanePermit {
    _permit: OwnedSemaphorePermit,
    running: Arc<AtomicUsize>,
}

impl Drop for LanePermit {
    fn drop(&mut self) {
        self.running.fetch_sub(1, Ordering::SeqCst);
    }
}

struct CounterGuard<'a>(&'a AtomicUsize);

impl<'a> CounterGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for CounterGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Maps tasks to lanes.
///
/// With partitioning, every priority level owns a lane of
/// `ceil(max_concurrency / levels)` slots, so the lanes together may hold
/// slightly more than `max_concurrency`. Without it, one lane serves all
/// priorities at the full ceiling.
#[derive(Debug)]
pub struct LaneRouter {
    lanes: HashMap<Priority, Arc<Lane>>,
    fallback: Arc<Lane>,
    partitioned: bool,
}

impl LaneRouter {
    pub fn new(max_concurrency: usize, priority_queues: bool) -> Self {
        let max_concurrency = max_concurrency.max(1);
        let mut lanes = HashMap::new();

        if priority_queues {
            let per_lane = max_concurrency.div_ceil(Priority::ALL.len()).max(1);
            for priority in Priority::ALL {
                lanes.insert(priority, Arc::new(Lane::new(priority, per_lane)));
            }
        } else {
            lanes.insert(
                Priority::Normal,
                Arc::new(Lane::new(Priority::Normal, max_concurrency)),
            );
        }

        let fallback = match lanes.get(&Priority::Normal) {
            Some(lane) => Arc::clone(lane),
            None => Arc::new(Lane::new(Priority::Normal, max_concurrency)),
        };

        debug!(
            partitioned = priority_queues,
            lanes = lanes.len(),
            "initialised priority lanes"
        );

        Self {
            lanes,
            fallback,
            partitioned: priority_queues,
        }
    }

    pub fn is_partitioned(&self) -> bool {
        self.partitioned
    }

    /// Lane serving `priority`; the normal lane when there is no match.
    pub fn route(&self, priority: Priority) -> &Arc<Lane> {
        if !self.partitioned {
            return &self.fallback;
        }
        self.lanes.get(&priority).unwrap_or(&self.fallback)
    }

    pub fn capacity_of(&self, priority: Priority) -> usize {
        self.route(priority).capacity()
    }

    /// Sum of all lane capacities.
    pub fn total_capacity(&self) -> usize {
        self.lanes.values().map(|l| l.capacity()).sum()
    }

    /// Status of every lane, lowest priority first.
    pub fn status(&self) -> Vec<LaneStatus> {
        let mut status: Vec<LaneStatus> = self.lanes.values().map(|l| l.status()).collect();
        status.sort_by_key(|s| s.priority);
        status
    }

    /// Close every lane: waiting tasks fail admission, running tasks keep
    /// their permits until they settle.
    pub fn close(&self) {
        for lane in self.lanes.values() {
            lane.close();
        }
    }
}
