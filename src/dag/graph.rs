// src/dag/graph.rs

use std::collections::{HashMap, HashSet};

use crate::task::TaskId;

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone, Default)]
struct DagNode {
    /// Direct dependencies: tasks that must complete before this one can run.
    deps: Vec<TaskId>,
    /// Direct dependents: tasks that depend on this one.
    dependents: Vec<TaskId>,
}

/// Simple in-memory DAG representation keyed by task ID.
///
/// This is intentionally lightweight; acyclicity is validated by the
/// resolver before edges are inserted, so here we just keep adjacency
/// information for eligibility checks and dependent re-evaluation.
#[derive(Debug, Clone, Default)]
pub(crate) struct DepGraph {
    nodes: HashMap<TaskId, DagNode>,
}

impl DepGraph {
    /// Register a new task node with its (already validated) dependencies.
    pub fn insert(&mut self, id: TaskId, deps: &HashSet<TaskId>) {
        let node = DagNode {
            deps: deps.iter().copied().collect(),
            dependents: Vec::new(),
        };
        self.nodes.insert(id, node);

        for dep in deps {
            if let Some(dep_node) = self.nodes.get_mut(dep) {
                dep_node.dependents.push(id);
            }
        }
    }

    /// Add a single `dep -> task` edge (used when a workflow merges extra
    /// dependencies into existing tasks). Duplicate edges are ignored.
    pub fn add_edge(&mut self, dep: TaskId, task: TaskId) {
        if let Some(node) = self.nodes.get_mut(&task)
            && !node.deps.contains(&dep)
        {
            node.deps.push(dep);
        }
        if let Some(dep_node) = self.nodes.get_mut(&dep)
            && !dep_node.dependents.contains(&task)
        {
            dep_node.dependents.push(task);
        }
    }

    /// Immediate dependencies of a task.
    #[cfg(test)]
    pub fn dependencies_of(&self, id: TaskId) -> &[TaskId] {
        self.nodes.get(&id).map(|n| n.deps.as_slice()).unwrap_or(&[])
    }

    /// Immediate dependents of a task (tasks that list this one as a
    /// dependency).
    pub fn dependents_of(&self, id: TaskId) -> &[TaskId] {
        self.nodes
            .get(&id)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// All node IDs.
    pub fn node_ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.nodes.keys().copied()
    }

    /// All `dep -> task` edges.
    pub fn edges(&self) -> impl Iterator<Item = (TaskId, TaskId)> + '_ {
        self.nodes
            .iter()
            .flat_map(|(&task, node)| node.deps.iter().map(move |&dep| (dep, task)))
    }
}
