// tests/graph_building.rs

use taskstage::dag::{DependencyGraph, Task};
use taskstage::errors::TaskstageError;
use taskstage::types::Priority;

fn idx(graph: &DependencyGraph, id: &str) -> usize {
    graph.index_of(id).unwrap()
}

#[test]
fn degrees_follow_dependency_edges() {
    let tasks = vec![
        Task::new("A"),
        Task::new("B").depends_on("A"),
        Task::new("C").depends_on("A"),
        Task::new("D").depends_on("B").depends_on("C"),
    ];

    let graph = DependencyGraph::build(&tasks).unwrap();

    assert_eq!(graph.len(), 4);
    assert_eq!(graph.edge_count(), 4);
    assert_eq!(graph.in_degree(idx(&graph, "A")), 0);
    assert_eq!(graph.out_degree(idx(&graph, "A")), 2);
    assert_eq!(graph.in_degree(idx(&graph, "D")), 2);
    assert_eq!(graph.out_degree(idx(&graph, "D")), 0);

    let deps_of_d: Vec<&str> = graph
        .dependencies_of(idx(&graph, "D"))
        .iter()
        .map(|&i| graph.node(i).id.as_str())
        .collect();
    assert_eq!(deps_of_d, vec!["B", "C"]);
}

#[test]
fn subtasks_depend_on_their_parent() {
    let tasks = vec![
        Task::new("P")
            .with_priority(Priority::High)
            .with_subtask(Task::new("S1"))
            .with_subtask(Task::new("S2").with_subtask(Task::new("S2a"))),
    ];

    let graph = DependencyGraph::build(&tasks).unwrap();

    assert_eq!(graph.len(), 4);
    assert_eq!(graph.out_degree(idx(&graph, "P")), 2);
    assert_eq!(graph.in_degree(idx(&graph, "S2a")), 1);

    let s2a = graph.node(idx(&graph, "S2a"));
    assert_eq!(s2a.parent.as_deref(), Some("S2"));
    assert_eq!(graph.node(idx(&graph, "P")).parent, None);
}

#[test]
fn subtask_dependencies_are_honoured() {
    let tasks = vec![
        Task::new("lint"),
        Task::new("build").with_subtask(Task::new("docs").depends_on("lint")),
    ];

    let graph = DependencyGraph::build(&tasks).unwrap();

    assert_eq!(graph.in_degree(idx(&graph, "docs")), 2);
}

#[test]
fn repeated_dependency_counts_once() {
    let tasks = vec![Task::new("A"), Task::new("B").depends_on("A").depends_on("A")];

    let graph = DependencyGraph::build(&tasks).unwrap();

    assert_eq!(graph.edge_count(), 1);
    assert_eq!(graph.in_degree(idx(&graph, "B")), 1);
    assert_eq!(graph.out_degree(idx(&graph, "A")), 1);
}

#[test]
fn duplicate_ids_are_rejected() {
    let tasks = vec![Task::new("A"), Task::new("B").with_subtask(Task::new("A"))];

    match DependencyGraph::build(&tasks) {
        Err(TaskstageError::DuplicateTask(id)) => assert_eq!(id, "A"),
        other => panic!("expected DuplicateTask, got {other:?}"),
    }
}

#[test]
fn unknown_dependency_is_rejected() {
    let tasks = vec![Task::new("A").depends_on("ghost")];

    match DependencyGraph::build(&tasks) {
        Err(TaskstageError::DanglingDependency { task, dependency }) => {
            assert_eq!(task, "A");
            assert_eq!(dependency, "ghost");
        }
        other => panic!("expected DanglingDependency, got {other:?}"),
    }
}

#[test]
fn two_node_cycle_reports_its_path() {
    let tasks = vec![Task::new("A").depends_on("B"), Task::new("B").depends_on("A")];

    let err = DependencyGraph::build(&tasks).unwrap_err();

    match &err {
        TaskstageError::CircularDependency(path) => {
            assert_eq!(path.len(), 3);
            assert_eq!(path.first(), path.last());
            assert!(path.contains(&"A".to_string()));
            assert!(path.contains(&"B".to_string()));
        }
        other => panic!("expected CircularDependency, got {other:?}"),
    }
    assert!(err.to_string().contains(" -> "));
}

#[test]
fn self_dependency_is_a_cycle() {
    let tasks = vec![Task::new("A").depends_on("A")];

    match DependencyGraph::build(&tasks) {
        Err(TaskstageError::CircularDependency(path)) => {
            assert_eq!(path, vec!["A".to_string(), "A".to_string()]);
        }
        other => panic!("expected CircularDependency, got {other:?}"),
    }
}

#[test]
fn cycle_through_a_subtask_is_detected() {
    let tasks = vec![Task::new("P").depends_on("S").with_subtask(Task::new("S"))];

    assert!(matches!(
        DependencyGraph::build(&tasks),
        Err(TaskstageError::CircularDependency(_))
    ));
}

#[test]
fn dot_export_lists_every_task_and_edge() {
    let tasks = vec![Task::new("fetch"), Task::new("build").depends_on("fetch")];
    let graph = DependencyGraph::build(&tasks).unwrap();

    let dot = graph.to_dot();

    assert!(dot.starts_with("digraph"));
    assert!(dot.contains("\"fetch\""));
    assert!(dot.contains("\"build\""));
    assert!(dot.contains("0 -> 1"));
}
