use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::bail;
use taskstage::dag::TaskSpec;
use taskstage::exec::{WorkFuture, Worker};
use taskstage::types::{Priority, TaskId};
use tokio::time::Instant;

/// What a scripted task does on each attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    Succeed,
    /// Fail the first `n` attempts, then succeed.
    FailTimes(u32),
    AlwaysFail,
    /// Sleep, then succeed.
    Sleep(Duration),
    /// Never finish.
    Hang,
    Panic,
}

/// One recorded attempt.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub task: TaskId,
    pub priority: Priority,
    /// 1-based attempt number for this task.
    pub number: u32,
    pub started: Instant,
    /// `None` while running, or if the attempt never finished.
    pub finished: Option<Instant>,
}

#[derive(Debug, Default)]
struct Gauge {
    current: HashMap<Priority, usize>,
    max: HashMap<Priority, usize>,
    total: usize,
    max_total: usize,
}

/// A fake worker that:
/// - runs a per-task scripted [`Behaviour`] (default: succeed)
/// - records every attempt with start/end instants
/// - tracks how many attempts of each priority were in flight at once.
///
/// Cloning shares the recorded state, so a test can keep a handle while
/// the scheduler owns the worker. Successful attempts return the task id.
#[derive(Debug, Clone, Default)]
pub struct ScriptedWorker {
    behaviours: Arc<HashMap<TaskId, Behaviour>>,
    attempts: Arc<Mutex<Vec<Attempt>>>,
    gauge: Arc<Mutex<Gauge>>,
}

impl ScriptedWorker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script `task`. Must be called before the worker is cloned.
    pub fn with(mut self, task: &str, behaviour: Behaviour) -> Self {
        Arc::make_mut(&mut self.behaviours).insert(task.to_string(), behaviour);
        self
    }

    pub fn attempts(&self) -> Vec<Attempt> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn attempts_of(&self, task: &str) -> Vec<Attempt> {
        self.attempts()
            .into_iter()
            .filter(|a| a.task == task)
            .collect()
    }

    /// Task ids in the order their first attempt started.
    pub fn start_order(&self) -> Vec<TaskId> {
        self.attempts()
            .into_iter()
            .filter(|a| a.number == 1)
            .map(|a| a.task)
            .collect()
    }

    pub fn max_concurrency_of(&self, priority: Priority) -> usize {
        let gauge = self.gauge.lock().unwrap();
        gauge.max.get(&priority).copied().unwrap_or(0)
    }

    pub fn max_total_concurrency(&self) -> usize {
        self.gauge.lock().unwrap().max_total
    }

    fn begin(&self, task: &TaskSpec) -> (usize, u32) {
        let mut attempts = self.attempts.lock().unwrap();
        let number = attempts.iter().filter(|a| a.task == task.id).count() as u32 + 1;
        attempts.push(Attempt {
            task: task.id.clone(),
            priority: task.priority,
            number,
            started: Instant::now(),
            finished: None,
        });
        let slot = attempts.len() - 1;
        drop(attempts);

        let mut gauge = self.gauge.lock().unwrap();
        let current = gauge.current.entry(task.priority).or_insert(0);
        *current += 1;
        let current = *current;
        let max = gauge.max.entry(task.priority).or_insert(0);
        *max = (*max).max(current);
        gauge.total += 1;
        gauge.max_total = gauge.max_total.max(gauge.total);

        (slot, number)
    }
}

/// Marks an attempt finished when the attempt future completes or is
/// dropped.
struct InFlight {
    worker: ScriptedWorker,
    priority: Priority,
    slot: usize,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if let Ok(mut attempts) = self.worker.attempts.lock() {
            attempts[self.slot].finished = Some(Instant::now());
        }
        if let Ok(mut gauge) = self.worker.gauge.lock() {
            if let Some(current) = gauge.current.get_mut(&self.priority) {
                *current -= 1;
            }
            gauge.total -= 1;
        }
    }
}

impl Worker for ScriptedWorker {
    type Output = String;

    fn perform(&self, task: Arc<TaskSpec>) -> WorkFuture<String> {
        let behaviour = self
            .behaviours
            .get(&task.id)
            .copied()
            .unwrap_or(Behaviour::Succeed);
        let (slot, number) = self.begin(&task);
        let guard = InFlight {
            worker: self.clone(),
            priority: task.priority,
            slot,
        };

        Box::pin(async move {
            let _guard = guard;
            match behaviour {
                Behaviour::Succeed => {}
                Behaviour::FailTimes(n) if number <= n => {
                    bail!("{} failed on attempt {number}", task.id)
                }
                Behaviour::FailTimes(_) => {}
                Behaviour::AlwaysFail => bail!("{} failed on attempt {number}", task.id),
                Behaviour::Sleep(d) => tokio::time::sleep(d).await,
                Behaviour::Hang => std::future::pending::<()>().await,
                Behaviour::Panic => panic!("{} panicked", task.id),
            }
            Ok(task.id.clone())
        })
    }
}
