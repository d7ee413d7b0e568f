// src/engine/metrics.rs

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Aggregate counters for one `execute_tasks` invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecutionMetrics {
    /// Tasks that settled after being dispatched (completed + failed).
    pub total_tasks: u64,
    pub completed_tasks: u64,
    pub failed_tasks: u64,
    /// Tasks never dispatched because a dependency failed.
    pub skipped_tasks: u64,
    pub total_execution_time: Duration,
    pub average_execution_time: Duration,
}

/// Lock-free recorder; each settling task adds its own contribution.
#[derive(Debug, Default)]
pub struct MetricsRecorder {
    total: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
    total_micros: AtomicU64,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, success: bool, execution_time: Duration) {
        self.total.fetch_add(1, Ordering::Relaxed);
        if success {
            self.completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        let micros = u64::try_from(execution_time.as_micros()).unwrap_or(u64::MAX);
        self.total_micros.fetch_add(micros, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ExecutionMetrics {
        let total = self.total.load(Ordering::Relaxed);
        let total_micros = self.total_micros.load(Ordering::Relaxed);
        let average = if total == 0 {
            Duration::ZERO
        } else {
            Duration::from_micros(total_micros / total)
        };

        ExecutionMetrics {
            total_tasks: total,
            completed_tasks: self.completed.load(Ordering::Relaxed),
            failed_tasks: self.failed.load(Ordering::Relaxed),
            skipped_tasks: self.skipped.load(Ordering::Relaxed),
            total_execution_time: Duration::from_micros(total_micros),
            average_execution_time: average,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_is_total_over_settled_tasks() {
        let recorder = MetricsRecorder::new();
        recorder.record(true, Duration::from_millis(100));
        recorder.record(false, Duration::from_millis(300));
        recorder.record_skipped();

        let m = recorder.snapshot();
        assert_eq!(m.total_tasks, 2);
        assert_eq!(m.completed_tasks, 1);
        assert_eq!(m.failed_tasks, 1);
        assert_eq!(m.skipped_tasks, 1);
        assert_eq!(m.total_execution_time, Duration::from_millis(400));
        assert_eq!(m.average_execution_time, Duration::from_millis(200));
    }

    #[test]
    fn empty_recorder_has_zero_average() {
        assert_eq!(MetricsRecorder::new().snapshot(), ExecutionMetrics::default());
    }
}
