// tests/config_loading.rs

use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;
use taskstage::config::{PlanFile, load_and_validate};
use taskstage::errors::TaskstageError;
use taskstage::types::{FailurePolicy, LoadBalancing, Priority};
use taskstage_test_utils::builders::{PlanFileBuilder, TaskConfigBuilder};

fn write_plan(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn full_plan_file_is_loaded() {
    let file = write_plan(
        r#"
[config]
max_concurrency = 8
max_queue_size = 50
priority_queues = false
load_balancing = "round-robin"
timeout_ms = 2000
failure_policy = "skip-dependents"

[config.retry]
max_retries = 1
backoff_ms = 250
exponential = false

[[task]]
id = "fetch"
cmd = "git fetch"

[[task]]
id = "build"
cmd = "cargo build"
priority = "high"
depends_on = ["fetch"]
timeout_ms = 120000

[[task.subtasks]]
id = "docs"
cmd = "cargo doc"
"#,
    );

    let plan = load_and_validate(file.path()).unwrap();
    let cfg = plan.scheduler_config();

    assert_eq!(cfg.max_concurrency, 8);
    assert_eq!(cfg.max_queue_size, 50);
    assert!(!cfg.priority_queues);
    assert_eq!(cfg.load_balancing, LoadBalancing::RoundRobin);
    assert_eq!(cfg.timeout, Duration::from_secs(2));
    assert_eq!(cfg.failure_policy, FailurePolicy::SkipDependents);
    assert_eq!(cfg.retry.max_retries, 1);
    assert_eq!(cfg.retry.backoff, Duration::from_millis(250));
    assert!(!cfg.retry.exponential);

    let tasks = plan.tasks();
    assert_eq!(tasks.len(), 2);
    let build = &tasks[1];
    assert_eq!(build.priority, Priority::High);
    assert_eq!(build.depends_on, vec!["fetch".to_string()]);
    assert_eq!(build.timeout, Some(Duration::from_secs(120)));
    assert_eq!(build.subtasks.len(), 1);
    assert_eq!(build.subtasks[0].id, "docs");
    assert_eq!(build.subtasks[0].payload, "cargo doc");
}

#[test]
fn missing_config_section_uses_defaults() {
    let file = write_plan(
        r#"
[[task]]
id = "only"
cmd = "true"
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap().scheduler_config();

    assert_eq!(cfg, taskstage::engine::SchedulerConfig::default());
}

#[test]
fn unknown_priority_falls_back_to_normal() {
    let plan = PlanFileBuilder::new()
        .with_task(TaskConfigBuilder::new("odd").priority("urgent").build())
        .with_task(TaskConfigBuilder::new("loud").priority("CRITICAL").build())
        .build();

    let tasks = plan.tasks();

    assert_eq!(tasks[0].priority, Priority::Normal);
    assert_eq!(tasks[1].priority, Priority::Critical);
}

#[test]
fn plan_without_tasks_is_rejected() {
    let file = write_plan("[config]\nmax_concurrency = 2\n");

    match load_and_validate(file.path()) {
        Err(TaskstageError::ConfigError(msg)) => assert!(msg.contains("at least one")),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn zero_concurrency_is_rejected() {
    let raw = PlanFileBuilder::new()
        .max_concurrency(0)
        .with_task(TaskConfigBuilder::new("a").build())
        .raw();

    match PlanFile::try_from(raw) {
        Err(TaskstageError::ConfigError(msg)) => assert!(msg.contains("max_concurrency")),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn empty_task_id_is_rejected() {
    let raw = PlanFileBuilder::new()
        .with_task(TaskConfigBuilder::new("  ").build())
        .raw();

    assert!(matches!(
        PlanFile::try_from(raw),
        Err(TaskstageError::ConfigError(_))
    ));
}

#[test]
fn unknown_dependency_is_rejected_at_load_time() {
    let file = write_plan(
        r#"
[[task]]
id = "A"
cmd = "echo A"
depends_on = ["NonExistent"]
"#,
    );

    match load_and_validate(file.path()) {
        Err(TaskstageError::DanglingDependency { task, dependency }) => {
            assert_eq!(task, "A");
            assert_eq!(dependency, "NonExistent");
        }
        other => panic!("expected DanglingDependency, got {other:?}"),
    }
}

#[test]
fn cycle_is_rejected_at_load_time() {
    let raw = PlanFileBuilder::new()
        .with_task(TaskConfigBuilder::new("A").after("B").build())
        .with_task(TaskConfigBuilder::new("B").after("A").build())
        .raw();

    assert!(matches!(
        PlanFile::try_from(raw),
        Err(TaskstageError::CircularDependency(_))
    ));
}

#[test]
fn duplicate_subtask_id_is_rejected() {
    let raw = PlanFileBuilder::new()
        .with_task(TaskConfigBuilder::new("A").build())
        .with_task(
            TaskConfigBuilder::new("B")
                .subtask(TaskConfigBuilder::new("A").build())
                .build(),
        )
        .raw();

    assert!(matches!(
        PlanFile::try_from(raw),
        Err(TaskstageError::DuplicateTask(id)) if id == "A"
    ));
}

#[test]
fn invalid_toml_is_a_toml_error() {
    let file = write_plan("[[task]\nid = ");

    assert!(matches!(
        load_and_validate(file.path()),
        Err(TaskstageError::TomlError(_))
    ));
}

#[test]
fn unknown_failure_policy_is_a_toml_error() {
    let file = write_plan(
        r#"
[config]
failure_policy = "explode"

[[task]]
id = "a"
"#,
    );

    assert!(matches!(
        load_and_validate(file.path()),
        Err(TaskstageError::TomlError(_))
    ));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();

    assert!(matches!(
        load_and_validate(dir.path().join("nope.toml")),
        Err(TaskstageError::IoError(_))
    ));
}
