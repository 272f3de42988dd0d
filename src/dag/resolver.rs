// src/dag/resolver.rs

//! Pure dependency logic: eligibility checks and acyclicity validation.
//!
//! Everything here works on snapshots owned by the registry; nothing is
//! cached across calls.

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::warn;

use crate::dag::graph::DepGraph;
use crate::errors::{Result, SchedulerError};
use crate::task::{Task, TaskId, TaskStatus};

/// A task is eligible to run iff every one of its dependencies is
/// `Completed`.
pub(crate) fn deps_satisfied(tasks: &HashMap<TaskId, Task>, task: &Task) -> bool {
    for dep_id in &task.dependencies {
        match tasks.get(dep_id) {
            Some(dep) if dep.status == TaskStatus::Completed => {}
            Some(_) => return false,
            None => {
                // Should not happen since dependencies are validated at
                // creation time.
                warn!(task = %task.id, dep = %dep_id, "dependency missing from registry");
                return false;
            }
        }
    }
    true
}

/// Validate that the dependency graph stays acyclic after adding
/// `extra_edges` (each `(dep, task)`).
///
/// Edge direction: `dep -> task`, so a topological sort fails exactly when
/// a dependency cycle exists.
pub(crate) fn ensure_acyclic(graph: &DepGraph, extra_edges: &[(TaskId, TaskId)]) -> Result<()> {
    let mut g: DiGraphMap<TaskId, ()> = DiGraphMap::new();

    for id in graph.node_ids() {
        g.add_node(id);
    }
    for (dep, task) in graph.edges().chain(extra_edges.iter().copied()) {
        if dep == task {
            return Err(SchedulerError::Dependency(format!(
                "{task} cannot depend on itself"
            )));
        }
        g.add_edge(dep, task, ());
    }

    match toposort(&g, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(SchedulerError::Dependency(format!(
            "dependency cycle detected involving {}",
            cycle.node_id()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn graph_of(edges: &[(u64, u64)], nodes: &[u64]) -> DepGraph {
        let mut g = DepGraph::default();
        for &n in nodes {
            g.insert(TaskId(n), &HashSet::new());
        }
        for &(dep, task) in edges {
            g.add_edge(TaskId(dep), TaskId(task));
        }
        g
    }

    #[test]
    fn chain_is_acyclic() {
        let g = graph_of(&[(1, 2), (2, 3)], &[1, 2, 3]);
        assert!(ensure_acyclic(&g, &[]).is_ok());
    }

    #[test]
    fn two_node_cycle_is_rejected() {
        let g = graph_of(&[(1, 2)], &[1, 2]);
        let err = ensure_acyclic(&g, &[(TaskId(2), TaskId(1))]).unwrap_err();
        assert!(matches!(err, SchedulerError::Dependency(_)));
    }

    #[test]
    fn self_edge_is_rejected() {
        let g = graph_of(&[], &[1]);
        let err = ensure_acyclic(&g, &[(TaskId(1), TaskId(1))]).unwrap_err();
        assert!(matches!(err, SchedulerError::Dependency(_)));
    }
}
