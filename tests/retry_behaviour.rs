// tests/retry_behaviour.rs

use std::time::Duration;

use taskstage::dag::Task;
use taskstage::engine::{ChannelObserver, Parallelizer, RetryPolicy, SchedulerConfig, SchedulerEvent};
use taskstage::errors::TaskError;
use taskstage::types::{Priority, TaskStatus};
use taskstage_test_utils::drain_events;
use taskstage_test_utils::fake_worker::{Behaviour, ScriptedWorker};
use taskstage_test_utils::init_tracing;

fn config_with_retry(max_retries: u32, backoff_ms: u64, exponential: bool) -> SchedulerConfig {
    SchedulerConfig {
        retry: RetryPolicy {
            max_retries,
            backoff: Duration::from_millis(backoff_ms),
            exponential,
        },
        ..SchedulerConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn flaky_task_succeeds_after_exponential_backoff() {
    init_tracing();

    let worker = ScriptedWorker::new().with("flaky", Behaviour::FailTimes(2));
    let (observer, mut rx) = ChannelObserver::new(64);
    let parallelizer = Parallelizer::new(config_with_retry(3, 100, true), worker.clone())
        .with_observer(observer);

    let report = parallelizer.execute_tasks(&[Task::new("flaky")]).await.unwrap();

    let record = report.get("flaky").unwrap();
    assert_eq!(record.status, TaskStatus::Completed);
    assert_eq!(record.attempts, 3);
    assert_eq!(record.result().map(String::as_str), Some("flaky"));

    let attempts = worker.attempts_of("flaky");
    assert_eq!(attempts.len(), 3);
    let first_gap = attempts[1].started - attempts[0].started;
    let second_gap = attempts[2].started - attempts[1].started;
    assert!(first_gap >= Duration::from_millis(100) && first_gap < Duration::from_millis(150));
    assert!(second_gap >= Duration::from_millis(200) && second_gap < Duration::from_millis(250));

    let retries: Vec<(u32, Duration)> = drain_events(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            SchedulerEvent::TaskRetrying { retry, backoff, .. } => Some((retry, backoff)),
            _ => None,
        })
        .collect();
    assert_eq!(
        retries,
        vec![(1, Duration::from_millis(100)), (2, Duration::from_millis(200))]
    );
}

#[tokio::test(start_paused = true)]
async fn fixed_backoff_waits_the_same_each_time() {
    let worker = ScriptedWorker::new().with("flaky", Behaviour::FailTimes(2));
    let parallelizer = Parallelizer::new(config_with_retry(3, 100, false), worker.clone());

    parallelizer.execute_tasks(&[Task::new("flaky")]).await.unwrap();

    let attempts = worker.attempts_of("flaky");
    let second_gap = attempts[2].started - attempts[1].started;
    assert!(second_gap >= Duration::from_millis(100) && second_gap < Duration::from_millis(150));
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_report_the_last_error() {
    let worker = ScriptedWorker::new().with("broken", Behaviour::AlwaysFail);
    let parallelizer = Parallelizer::new(config_with_retry(2, 10, true), worker.clone());

    let report = parallelizer.execute_tasks(&[Task::new("broken")]).await.unwrap();

    let record = report.get("broken").unwrap();
    assert_eq!(record.status, TaskStatus::Failed);
    assert_eq!(record.attempts, 3);
    assert_eq!(
        record.error(),
        Some(&TaskError::Failed("broken failed on attempt 3".to_string()))
    );
    assert_eq!(worker.attempts_of("broken").len(), 3);
}

#[tokio::test(start_paused = true)]
async fn zero_retries_means_a_single_attempt() {
    let worker = ScriptedWorker::new().with("once", Behaviour::AlwaysFail);
    let config = SchedulerConfig {
        retry: RetryPolicy::no_retries(),
        ..SchedulerConfig::default()
    };
    let parallelizer = Parallelizer::new(config, worker.clone());

    let report = parallelizer.execute_tasks(&[Task::new("once")]).await.unwrap();

    assert_eq!(report.get("once").unwrap().attempts, 1);
    assert_eq!(worker.attempts_of("once").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn timed_out_attempts_are_retried_then_fail_with_timeout() {
    let worker = ScriptedWorker::new().with("stuck", Behaviour::Hang);
    let parallelizer = Parallelizer::new(config_with_retry(1, 10, true), worker.clone());

    let task = Task::new("stuck").with_timeout(Duration::from_millis(50));
    let report = parallelizer.execute_tasks(&[task]).await.unwrap();

    let record = report.get("stuck").unwrap();
    assert_eq!(record.status, TaskStatus::Failed);
    assert_eq!(record.attempts, 2);
    assert_eq!(
        record.error(),
        Some(&TaskError::Timeout(Duration::from_millis(50)))
    );

    // Abandoned attempts are never reported as finished.
    assert!(worker.attempts_of("stuck").iter().all(|a| a.finished.is_none()));
}

#[tokio::test(start_paused = true)]
async fn default_timeout_applies_without_a_task_override() {
    let worker = ScriptedWorker::new().with("slow", Behaviour::Sleep(Duration::from_secs(5)));
    let config = SchedulerConfig {
        timeout: Duration::from_secs(1),
        retry: RetryPolicy::no_retries(),
        ..SchedulerConfig::default()
    };
    let parallelizer = Parallelizer::new(config, worker);

    let report = parallelizer.execute_tasks(&[Task::new("slow")]).await.unwrap();

    assert_eq!(
        report.get("slow").unwrap().error(),
        Some(&TaskError::Timeout(Duration::from_secs(1)))
    );
}

#[tokio::test(start_paused = true)]
async fn panicking_work_settles_as_failed() {
    let worker = ScriptedWorker::new().with("boom", Behaviour::Panic);
    let config = SchedulerConfig {
        retry: RetryPolicy::no_retries(),
        ..SchedulerConfig::default()
    };
    let parallelizer = Parallelizer::new(config, worker);

    let report = parallelizer.execute_tasks(&[Task::new("boom")]).await.unwrap();

    let record = report.get("boom").unwrap();
    assert_eq!(record.status, TaskStatus::Failed);
    assert!(matches!(record.error(), Some(TaskError::Panicked(_))));
}

#[tokio::test(start_paused = true)]
async fn abandoned_attempts_outlive_their_lane_slot() {
    let worker = ScriptedWorker::new().with("stuck", Behaviour::Hang);
    let config = SchedulerConfig {
        max_concurrency: 4,
        ..config_with_retry(2, 10, false)
    };
    let parallelizer = Parallelizer::new(config, worker.clone());

    let task = Task::new("stuck")
        .with_priority(Priority::Critical)
        .with_timeout(Duration::from_millis(50));
    let report = parallelizer.execute_tasks(&[task]).await.unwrap();

    assert_eq!(report.get("stuck").unwrap().attempts, 3);
    assert_eq!(parallelizer.queue_status()[3].capacity, 1);
    assert_eq!(worker.max_concurrency_of(Priority::Critical), 3);
}
