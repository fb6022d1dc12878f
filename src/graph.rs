use crate::task::Task;
use petgraph::Direction;
use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

/// Dependency DAG derived from the task index. Nodes are task ids, edges
/// run predecessor -> successor. The graph is rebuilt from the tasks on
/// demand so the per-task dependency lists stay the single source of truth.
pub struct DependencyDag {
    graph: DiGraph<i32, ()>,
    id_to_index: HashMap<i32, NodeIndex>,
}

impl DependencyDag {
    pub fn build(tasks: &BTreeMap<i32, Task>) -> Self {
        let mut dag = Self::with_nodes(tasks.keys().copied());
        for (id, task) in tasks {
            for pred in &task.dependencies {
                dag.insert_edge(*id, *pred);
            }
        }
        dag
    }

    /// An edge-less graph over the given task ids. Edges are added with
    /// [`insert_edge`](Self::insert_edge) or
    /// [`try_insert_edge`](Self::try_insert_edge).
    pub fn with_nodes(ids: impl IntoIterator<Item = i32>) -> Self {
        let mut graph: DiGraph<i32, ()> = DiGraph::new();
        let mut id_to_index = HashMap::new();
        for id in ids {
            if !id_to_index.contains_key(&id) {
                let node = graph.add_node(id);
                id_to_index.insert(id, node);
            }
        }
        Self { graph, id_to_index }
    }

    /// Add a predecessor -> successor edge. Edges with an unknown endpoint
    /// are skipped, mirroring how dangling ids are treated elsewhere.
    pub fn insert_edge(&mut self, task_id: i32, predecessor_id: i32) {
        if let (Some(&pred_ix), Some(&task_ix)) = (
            self.id_to_index.get(&predecessor_id),
            self.id_to_index.get(&task_id),
        ) {
            self.graph.add_edge(pred_ix, task_ix, ());
        }
    }

    /// Add the edge only when it keeps the graph acyclic; returns whether
    /// the edge was added.
    pub fn try_insert_edge(&mut self, task_id: i32, predecessor_id: i32) -> bool {
        if self.would_create_cycle(task_id, predecessor_id) {
            return false;
        }
        self.insert_edge(task_id, predecessor_id);
        true
    }

    /// True when making `predecessor_id` a predecessor of `task_id` would
    /// close a cycle: either a self-edge, or `predecessor_id` already
    /// depends (transitively) on `task_id`.
    pub fn would_create_cycle(&self, task_id: i32, predecessor_id: i32) -> bool {
        if task_id == predecessor_id {
            return true;
        }
        match (
            self.id_to_index.get(&task_id),
            self.id_to_index.get(&predecessor_id),
        ) {
            (Some(&task_ix), Some(&pred_ix)) => {
                has_path_connecting(&self.graph, task_ix, pred_ix, None)
            }
            _ => false,
        }
    }

    /// Tasks that directly depend on `task_id`, in ascending id order.
    pub fn direct_successors(&self, task_id: i32) -> Vec<i32> {
        let Some(&ix) = self.id_to_index.get(&task_id) else {
            return Vec::new();
        };
        let mut successors: Vec<i32> = self
            .graph
            .neighbors_directed(ix, Direction::Outgoing)
            .map(|n| self.graph[n])
            .collect();
        successors.sort_unstable();
        successors.dedup();
        successors
    }

    /// All tasks reachable through successor edges, each visited once.
    /// `task_id` itself is not included.
    pub fn transitive_successors(&self, task_id: i32) -> BTreeSet<i32> {
        let mut reached = BTreeSet::new();
        let Some(&start) = self.id_to_index.get(&task_id) else {
            return reached;
        };
        let mut queue = VecDeque::from([start]);
        while let Some(ix) = queue.pop_front() {
            for next in self.graph.neighbors_directed(ix, Direction::Outgoing) {
                if reached.insert(self.graph[next]) {
                    queue.push_back(next);
                }
            }
        }
        reached
    }

    pub fn contains(&self, task_id: i32) -> bool {
        self.id_to_index.contains_key(&task_id)
    }
}
