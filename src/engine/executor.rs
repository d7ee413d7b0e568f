// src/engine/executor.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::dag::{DependencyGraph, ExecutionPlan, NodeIndex, Task, TaskSpec};
use crate::engine::SchedulerConfig;
use crate::engine::lanes::{LaneRouter, LaneStatus};
use crate::engine::metrics::{ExecutionMetrics, MetricsRecorder};
use crate::engine::observer::{SchedulerObserver, TracingObserver};
use crate::engine::report::{ExecutionReport, TaskRecord};
use crate::engine::retry::{RetryPolicy, run_with_retry};
use crate::errors::{Result, TaskError};
use crate::exec::Worker;
use crate::types::{FailurePolicy, Priority, TaskId, TaskStatus};

/// A task that currently holds a lane slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveTask {
    pub id: TaskId,
    pub priority: Priority,
    pub started_at: SystemTime,
}

/// Dependency-aware parallel task scheduler.
///
/// Each [`execute_tasks`](Self::execute_tasks) call builds a fresh graph
/// and plan, then runs the plan stage by stage. A stage is a full
/// barrier: nothing from stage `k + 1` starts before every task in stage
/// `k` has settled. Within a stage all tasks are dispatched at once and
/// admitted by their priority lane.
pub struct Parallelizer<W: Worker> {
    config: SchedulerConfig,
    worker: Arc<W>,
    observer: Arc<dyn SchedulerObserver<W::Output>>,
    state: Arc<Mutex<SharedState>>,
    metrics: Mutex<Arc<MetricsRecorder>>,
}

/// Everything `shutdown()` resets, behind one lock so a reader never sees
/// a generation and a lane router from different sides of a shutdown.
#[derive(Debug)]
struct SharedState {
    /// Bumped by every `shutdown()`.
    generation: u64,
    lanes: Arc<LaneRouter>,
    active: HashMap<TaskId, ActiveTask>,
    completed: Vec<TaskId>,
}

impl<W: Worker> fmt::Debug for Parallelizer<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parallelizer")
            .field("config", &self.config)
            .field("generation", &lock(&self.state).generation)
            .finish_non_exhaustive()
    }
}

impl<W: Worker> Parallelizer<W> {
    /// Create a parallelizer that reports notifications through `tracing`.
    pub fn new(config: SchedulerConfig, worker: W) -> Self {
        let mut config = config;
        if config.max_concurrency == 0 {
            warn!("max_concurrency must be >= 1; clamping to 1");
            config.max_concurrency = 1;
        }

        let lanes = LaneRouter::new(config.max_concurrency, config.priority_queues);
        debug!(load_balancing = ?config.load_balancing, "load balancing strategy (reserved)");

        Self {
            config,
            worker: Arc::new(worker),
            observer: Arc::new(TracingObserver),
            state: Arc::new(Mutex::new(SharedState {
                generation: 0,
                lanes: Arc::new(lanes),
                active: HashMap::new(),
                completed: Vec::new(),
            })),
            metrics: Mutex::new(Arc::new(MetricsRecorder::new())),
        }
    }

    /// Replace the observer.
    pub fn with_observer(mut self, observer: impl SchedulerObserver<W::Output> + 'static) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Build, plan and run `tasks`.
    ///
    /// Fails only if the task set is rejected (duplicate ids, unknown
    /// dependencies, cycles), in which case no task has started. Task
    /// failures are recorded in the report, never returned as errors.
    pub async fn execute_tasks(&self, tasks: &[Task]) -> Result<ExecutionReport<W::Output>> {
        info!(task_count = tasks.len(), "starting parallel execution");

        let graph = DependencyGraph::build(tasks)?;
        let plan = ExecutionPlan::from_graph(&graph)?;

        info!(
            stages = plan.len(),
            critical_path_length = plan.critical_path().len(),
            parallelism_factor = plan.parallelism_factor(),
            "execution plan created"
        );

        let (generation, lanes) = self.lane_snapshot();
        let metrics = Arc::new(MetricsRecorder::new());
        *lock(&self.metrics) = Arc::clone(&metrics);

        let mut records: Vec<TaskRecord<W::Output>> =
            graph.nodes().map(|spec| TaskRecord::pending(spec)).collect();

        for (stage_no, stage) in plan.stages().iter().enumerate() {
            if lock(&self.state).generation != generation {
                warn!(
                    stage = stage_no,
                    remaining_stages = plan.len() - stage_no,
                    "parallelizer was shut down; not dispatching remaining stages"
                );
                break;
            }
            self.execute_stage(generation, stage_no, stage, &graph, &lanes, &metrics, &mut records)
                .await;
        }

        let summary = metrics.snapshot();
        info!(
            total_tasks = summary.total_tasks,
            completed_tasks = summary.completed_tasks,
            failed_tasks = summary.failed_tasks,
            skipped_tasks = summary.skipped_tasks,
            average_execution_ms = summary.average_execution_time.as_millis() as u64,
            "parallel execution completed"
        );

        Ok(ExecutionReport::new(records, &plan, summary))
    }

    /// Current generation and the lanes installed for it, read together.
    fn lane_snapshot(&self) -> (u64, Arc<LaneRouter>) {
        let state = lock(&self.state);
        (state.generation, Arc::clone(&state.lanes))
    }

    /// Dispatch every task of one stage and wait until all have settled.
    #[allow(clippy::too_many_arguments)]
    async fn execute_stage(
        &self,
        generation: u64,
        stage_no: usize,
        stage: &[NodeIndex],
        graph: &DependencyGraph,
        lanes: &Arc<LaneRouter>,
        metrics: &Arc<MetricsRecorder>,
        records: &mut [TaskRecord<W::Output>],
    ) {
        debug!(stage = stage_no, task_count = stage.len(), "executing stage");

        if stage.len() > self.config.max_queue_size {
            warn!(
                stage = stage_no,
                task_count = stage.len(),
                max_queue_size = self.config.max_queue_size,
                "stage exceeds advisory max_queue_size"
            );
        }

        let mut set = JoinSet::new();
        let mut dispatched = Vec::with_capacity(stage.len());

        for &idx in stage {
            let spec = graph.node(idx);

            if self.config.failure_policy == FailurePolicy::SkipDependents {
                if let Some(blocker) = failed_dependency(graph, records, idx) {
                    let blocked_by = &graph.node(blocker).id;
                    warn!(
                        task = %spec.id,
                        blocked_by = %blocked_by,
                        "skipping task: a dependency did not complete"
                    );
                    records[idx].status = TaskStatus::Skipped;
                    metrics.record_skipped();
                    self.observer.task_skipped(&spec.id, blocked_by);
                    continue;
                }
            }

            let dispatch = Dispatch {
                spec: Arc::clone(spec),
                worker: Arc::clone(&self.worker),
                observer: Arc::clone(&self.observer),
                lanes: Arc::clone(lanes),
                state: Arc::clone(&self.state),
                generation,
                metrics: Arc::clone(metrics),
                default_timeout: self.config.timeout,
                retry: self.config.retry,
            };
            records[idx].status = TaskStatus::Running;
            set.spawn(async move { (idx, dispatch.run().await) });
            dispatched.push(idx);
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, settlement)) => settlement.apply_to(&mut records[idx]),
                Err(err) => error!(stage = stage_no, error = %err, "task dispatch aborted"),
            }
        }

        // A dispatch that never reported back is still `Running`.
        for idx in dispatched {
            let record = &mut records[idx];
            if !record.status.is_settled() {
                record.status = TaskStatus::Failed;
                record.outcome = Some(Err(TaskError::Panicked(
                    "task dispatch aborted".to_string(),
                )));
            }
        }

        debug!(stage = stage_no, "stage settled");
    }

    /// Drop all waiting work and bookkeeping.
    ///
    /// Tasks waiting for a lane slot settle as failed with
    /// [`TaskError::Shutdown`]; running attempts are not waited for. A
    /// running `execute_tasks` dispatches no further stages. Fresh lanes
    /// are installed so the parallelizer can be used again.
    pub fn shutdown(&self) {
        info!("shutting down parallelizer");

        let fresh = Arc::new(LaneRouter::new(
            self.config.max_concurrency,
            self.config.priority_queues,
        ));

        let old = {
            let mut state = lock(&self.state);
            state.generation += 1;
            state.active.clear();
            state.completed.clear();
            std::mem::replace(&mut state.lanes, fresh)
        };
        old.close();

        self.observer.shutdown();
    }

    /// Metrics of the current or most recent invocation.
    pub fn metrics(&self) -> ExecutionMetrics {
        lock(&self.metrics).snapshot()
    }

    /// Tasks currently holding a lane slot.
    pub fn active_tasks(&self) -> Vec<ActiveTask> {
        let mut active: Vec<ActiveTask> = lock(&self.state).active.values().cloned().collect();
        active.sort_by(|a, b| a.id.cmp(&b.id));
        active
    }

    /// Ids of tasks that completed since the last shutdown, in settle order.
    ///
    /// Tasks dispatched before a shutdown are not listed even if they
    /// complete after it.
    pub fn completed_tasks(&self) -> Vec<TaskId> {
        lock(&self.state).completed.clone()
    }

    pub fn queue_status(&self) -> Vec<LaneStatus> {
        lock(&self.state).lanes.status()
    }
}

/// First dependency of `idx` that failed or was skipped.
fn failed_dependency<O>(
    graph: &DependencyGraph,
    records: &[TaskRecord<O>],
    idx: NodeIndex,
) -> Option<NodeIndex> {
    graph
        .dependencies_of(idx)
        .iter()
        .copied()
        .find(|&dep| matches!(records[dep].status, TaskStatus::Failed | TaskStatus::Skipped))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Everything one dispatched task needs, owned so it can be spawned.
struct Dispatch<W: Worker> {
    spec: Arc<TaskSpec>,
    worker: Arc<W>,
    observer: Arc<dyn SchedulerObserver<W::Output>>,
    lanes: Arc<LaneRouter>,
    state: Arc<Mutex<SharedState>>,
    /// Generation the owning `execute_tasks` call started in.
    generation: u64,
    metrics: Arc<MetricsRecorder>,
    default_timeout: Duration,
    retry: RetryPolicy,
}

/// How a dispatched task settled.
struct Settlement<O> {
    status: TaskStatus,
    outcome: std::result::Result<O, TaskError>,
    attempts: u32,
    started_at: Option<SystemTime>,
    ended_at: SystemTime,
    execution_time: Duration,
}

impl<O> Settlement<O> {
    fn apply_to(self, record: &mut TaskRecord<O>) {
        record.status = self.status;
        record.outcome = Some(self.outcome);
        record.attempts = self.attempts;
        record.started_at = self.started_at;
        record.ended_at = Some(self.ended_at);
        record.execution_time = Some(self.execution_time);
    }
}

impl<W: Worker> Dispatch<W> {
    /// pending -> running -> completed | failed, exactly once.
    async fn run(self) -> Settlement<W::Output> {
        let id = self.spec.id.clone();
        let lane = Arc::clone(self.lanes.route(self.spec.priority));

        let _permit = match lane.admit().await {
            Ok(permit) => permit,
            Err(err) => {
                warn!(task = %id, "lane closed before the task was admitted");
                self.metrics.record(false, Duration::ZERO);
                self.observer.task_failed(&id, &err, Duration::ZERO);
                return Settlement {
                    status: TaskStatus::Failed,
                    outcome: Err(err),
                    attempts: 0,
                    started_at: None,
                    ended_at: SystemTime::now(),
                    execution_time: Duration::ZERO,
                };
            }
        };

        let started_at = SystemTime::now();
        let start = Instant::now();

        {
            let mut state = lock(&self.state);
            if state.generation == self.generation {
                state.active.insert(
                    id.clone(),
                    ActiveTask {
                        id: id.clone(),
                        priority: self.spec.priority,
                        started_at,
                    },
                );
            }
        }
        self.observer.task_started(&id);

        let timeout = self.spec.effective_timeout(self.default_timeout);
        let outcome = run_with_retry(
            &self.worker,
            &self.spec,
            timeout,
            &self.retry,
            self.observer.as_ref(),
        )
        .await;

        let execution_time = start.elapsed();
        let current = {
            let mut state = lock(&self.state);
            let current = state.generation == self.generation;
            if current {
                state.active.remove(&id);
            }
            current
        };

        let status = match &outcome.result {
            Ok(value) => {
                self.metrics.record(true, execution_time);
                if current {
                    lock(&self.state).completed.push(id.clone());
                }
                debug!(
                    task = %id,
                    attempts = outcome.attempts,
                    execution_ms = execution_time.as_millis() as u64,
                    "task settled as completed"
                );
                self.observer.task_completed(&id, value, execution_time);
                TaskStatus::Completed
            }
            Err(err) => {
                self.metrics.record(false, execution_time);
                debug!(
                    task = %id,
                    attempts = outcome.attempts,
                    error = %err,
                    execution_ms = execution_time.as_millis() as u64,
                    "task settled as failed"
                );
                self.observer.task_failed(&id, err, execution_time);
                TaskStatus::Failed
            }
        };

        Settlement {
            status,
            outcome: outcome.result,
            attempts: outcome.attempts,
            started_at: Some(started_at),
            ended_at: SystemTime::now(),
            execution_time,
        }
    }
}
