// src/dag/graph.rs

use std::collections::HashMap;
use std::sync::Arc;

use petgraph::dot::{Config, Dot};
use petgraph::graph::DiGraph;
use tracing::debug;

use crate::dag::task::{Task, TaskSpec};
use crate::errors::{Result, TaskstageError};
use crate::types::TaskId;

/// Position of a task in the graph arena.
pub type NodeIndex = usize;

/// Internal node structure: the task record plus adjacency and degree
/// bookkeeping, all index based.
#[derive(Debug, Clone)]
struct DagNode {
    spec: Arc<TaskSpec>,
    /// Direct dependencies: tasks that must settle before this one starts.
    deps: Vec<NodeIndex>,
    /// Direct dependents: tasks that wait on this one.
    dependents: Vec<NodeIndex>,
    in_degree: usize,
    out_degree: usize,
}

/// Dependency graph for one invocation, built fresh from the submitted
/// tasks and discarded afterwards.
///
/// Nodes are every task plus every subtask (transitively), in submission
/// order with each task followed by its subtasks. An edge `from -> to`
/// means `from` must settle before `to` may start. A graph that
/// [`build`](Self::build) returns is guaranteed acyclic.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<DagNode>,
    index: HashMap<TaskId, NodeIndex>,
    edge_count: usize,
}

impl DependencyGraph {
    /// Build and validate the graph for a (possibly nested) task list.
    ///
    /// Fails on duplicate ids, dependencies on unknown tasks and cycles,
    /// before any task could have started.
    pub fn build(tasks: &[Task]) -> Result<Self> {
        let mut graph = Self::default();

        // First pass: nodes, plus implicit parent -> subtask edges.
        for task in tasks {
            graph.add_task(task, None)?;
        }

        // Second pass: explicit `depends_on` edges, for subtasks too.
        for to in 0..graph.nodes.len() {
            let spec = Arc::clone(&graph.nodes[to].spec);
            for dep in &spec.depends_on {
                let from = graph.index.get(dep).copied().ok_or_else(|| {
                    TaskstageError::DanglingDependency {
                        task: spec.id.clone(),
                        dependency: dep.clone(),
                    }
                })?;
                graph.add_edge(from, to);
            }
        }

        graph.detect_cycles()?;

        debug!(
            nodes = graph.nodes.len(),
            edges = graph.edge_count,
            "dependency graph built"
        );

        Ok(graph)
    }

    fn add_task(&mut self, task: &Task, parent: Option<NodeIndex>) -> Result<NodeIndex> {
        if self.index.contains_key(&task.id) {
            return Err(TaskstageError::DuplicateTask(task.id.clone()));
        }

        let parent_id = parent.map(|p| self.nodes[p].spec.id.clone());
        let idx = self.nodes.len();
        self.nodes.push(DagNode {
            spec: Arc::new(TaskSpec::from_task(task, parent_id.as_ref())),
            deps: Vec::new(),
            dependents: Vec::new(),
            in_degree: 0,
            out_degree: 0,
        });
        self.index.insert(task.id.clone(), idx);

        for subtask in &task.subtasks {
            let child = self.add_task(subtask, Some(idx))?;
            self.add_edge(idx, child);
        }

        Ok(idx)
    }

    /// Record `from -> to`, updating both degree counters.
    ///
    /// Returns `false` if the edge already existed; repeated edges are not
    /// counted twice.
    fn add_edge(&mut self, from: NodeIndex, to: NodeIndex) -> bool {
        if self.nodes[from].dependents.contains(&to) {
            return false;
        }

        self.nodes[from].dependents.push(to);
        self.nodes[from].out_degree += 1;
        self.nodes[to].deps.push(from);
        self.nodes[to].in_degree += 1;
        self.edge_count += 1;
        true
    }

    /// Depth-first search from every unvisited node, tracking the current
    /// recursion stack explicitly. An edge back into the stack is a cycle;
    /// the error carries the cycle path.
    fn detect_cycles(&self) -> Result<()> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Unvisited,
            OnStack,
            Done,
        }

        let mut marks = vec![Mark::Unvisited; self.nodes.len()];

        for root in 0..self.nodes.len() {
            if marks[root] != Mark::Unvisited {
                continue;
            }

            // (node, position of the next dependent to visit)
            let mut stack: Vec<(NodeIndex, usize)> = vec![(root, 0)];
            marks[root] = Mark::OnStack;

            while let Some(frame) = stack.last_mut() {
                let (node, pos) = *frame;

                let Some(&child) = self.nodes[node].dependents.get(pos) else {
                    marks[node] = Mark::Done;
                    stack.pop();
                    continue;
                };
                frame.1 += 1;

                match marks[child] {
                    Mark::Unvisited => {
                        marks[child] = Mark::OnStack;
                        stack.push((child, 0));
                    }
                    Mark::OnStack => {
                        let start = stack
                            .iter()
                            .position(|(n, _)| *n == child)
                            .unwrap_or(0);
                        let mut cycle: Vec<TaskId> = stack[start..]
                            .iter()
                            .map(|(n, _)| self.nodes[*n].spec.id.clone())
                            .collect();
                        cycle.push(self.nodes[child].spec.id.clone());
                        return Err(TaskstageError::CircularDependency(cycle));
                    }
                    Mark::Done => {}
                }
            }
        }

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// The task record at `idx`.
    pub fn node(&self, idx: NodeIndex) -> &Arc<TaskSpec> {
        &self.nodes[idx].spec
    }

    /// All task records in arena order.
    pub fn nodes(&self) -> impl Iterator<Item = &Arc<TaskSpec>> {
        self.nodes.iter().map(|n| &n.spec)
    }

    pub fn index_of(&self, id: &str) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    pub fn dependents_of(&self, idx: NodeIndex) -> &[NodeIndex] {
        &self.nodes[idx].dependents
    }

    pub fn dependencies_of(&self, idx: NodeIndex) -> &[NodeIndex] {
        &self.nodes[idx].deps
    }

    pub fn in_degree(&self, idx: NodeIndex) -> usize {
        self.nodes[idx].in_degree
    }

    pub fn out_degree(&self, idx: NodeIndex) -> usize {
        self.nodes[idx].out_degree
    }

    /// Every edge as `(from, to)`.
    pub fn edges(&self) -> impl Iterator<Item = (NodeIndex, NodeIndex)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .flat_map(|(from, n)| n.dependents.iter().map(move |&to| (from, to)))
    }

    /// Graph over bare ids with the given edges, skipping every check.
    #[cfg(test)]
    pub(crate) fn from_edges_unchecked(ids: &[&str], edges: &[(NodeIndex, NodeIndex)]) -> Self {
        let mut graph = Self::default();
        for id in ids {
            graph.add_task(&Task::new(*id), None).expect("ids are unique");
        }
        for &(from, to) in edges {
            graph.add_edge(from, to);
        }
        graph
    }

    /// Render the graph in Graphviz DOT format.
    pub fn to_dot(&self) -> String {
        let mut g: DiGraph<&str, &str> = DiGraph::with_capacity(self.nodes.len(), self.edge_count);
        let ids: Vec<_> = self
            .nodes
            .iter()
            .map(|n| g.add_node(n.spec.id.as_str()))
            .collect();
        for (from, to) in self.edges() {
            g.add_edge(ids[from], ids[to], "");
        }
        format!("{}", Dot::with_config(&g, &[Config::EdgeNoLabel]))
    }
}
