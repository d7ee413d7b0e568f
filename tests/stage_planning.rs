// tests/stage_planning.rs

use std::time::Duration;

use taskstage::dag::{DependencyGraph, ExecutionPlan, Task};

fn plan_for(tasks: &[Task]) -> ExecutionPlan {
    let graph = DependencyGraph::build(tasks).unwrap();
    ExecutionPlan::from_graph(&graph).unwrap()
}

fn sorted(stage: &[String]) -> Vec<&str> {
    let mut ids: Vec<&str> = stage.iter().map(String::as_str).collect();
    ids.sort();
    ids
}

#[test]
fn fan_out_gives_two_stages() {
    let plan = plan_for(&[
        Task::new("A"),
        Task::new("B").depends_on("A"),
        Task::new("C").depends_on("A"),
    ]);

    assert_eq!(plan.len(), 2);
    assert_eq!(sorted(&plan.stage_ids()[0]), vec!["A"]);
    assert_eq!(sorted(&plan.stage_ids()[1]), vec!["B", "C"]);
    assert_eq!(plan.stage_of("C"), Some(1));
}

#[test]
fn diamond_gives_three_stages_and_a_longest_path() {
    let plan = plan_for(&[
        Task::new("A"),
        Task::new("B").depends_on("A"),
        Task::new("C").depends_on("A"),
        Task::new("D").depends_on("B").depends_on("C"),
    ]);

    assert_eq!(plan.len(), 3);
    assert_eq!(sorted(&plan.stage_ids()[2]), vec!["D"]);

    let path = plan.critical_path();
    assert_eq!(path.len(), 3);
    assert_eq!(path[0], "A");
    assert!(path[1] == "B" || path[1] == "C");
    assert_eq!(path[2], "D");
}

#[test]
fn independent_tasks_share_one_stage() {
    let plan = plan_for(&[Task::new("x"), Task::new("y"), Task::new("z")]);

    assert_eq!(plan.len(), 1);
    assert_eq!(plan.task_count(), 3);
    assert_eq!(plan.critical_path(), &["x".to_string()]);
    assert_eq!(plan.parallelism_factor(), 1.0);
}

#[test]
fn parent_runs_one_stage_before_its_subtasks() {
    let plan = plan_for(&[Task::new("P")
        .with_subtask(Task::new("S1"))
        .with_subtask(Task::new("S2"))]);

    assert_eq!(plan.stage_of("P"), Some(0));
    assert_eq!(plan.stage_of("S1"), Some(1));
    assert_eq!(plan.stage_of("S2"), Some(1));
}

#[test]
fn empty_input_gives_empty_plan() {
    let plan = plan_for(&[]);

    assert!(plan.is_empty());
    assert!(plan.critical_path().is_empty());
    assert_eq!(plan.parallelism_factor(), 0.0);
    assert_eq!(plan.estimated_duration(), Duration::ZERO);
}

#[test]
fn parallelism_factor_and_estimate() {
    // Stages: [A], [B, C, D] -> widest 3, mean 2.
    let plan = plan_for(&[
        Task::new("A"),
        Task::new("B").depends_on("A"),
        Task::new("C").depends_on("A"),
        Task::new("D").depends_on("A"),
    ]);

    assert!((plan.parallelism_factor() - 1.5).abs() < f64::EPSILON);
    assert_eq!(plan.estimated_duration(), Duration::from_secs(2));
}
