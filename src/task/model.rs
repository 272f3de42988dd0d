// src/task/model.rs

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::errors::TaskError;

/// Unique task identifier, assigned by the registry at creation and
/// immutable afterwards.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TaskId(pub(crate) u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Unique workflow identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct WorkflowId(pub(crate) u64);

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "workflow-{}", self.0)
    }
}

/// What kind of work a task performs. Purely descriptive; the scheduler
/// treats all kinds the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskKind {
    Computation,
    Io,
    Network,
    Database,
    File,
    System,
    #[default]
    Custom,
}

/// Scheduling priority. The derived ordering is the scheduling order:
/// `Low < Normal < High < Critical < Urgent`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskPriority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
    Urgent,
}

/// Task lifecycle state.
///
/// Legal transitions:
/// `Pending -> Running -> {Completed, Pending (retry), Failed}` and
/// `Pending -> Cancelled`. No transition ever leaves a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Caller-supplied description of a task to create.
///
/// `dependencies` must reference tasks already known to the scheduler.
/// A `timeout` of `None` means the scheduler's `task_timeout_default`
/// applies.
#[derive(Debug, Clone, Default)]
pub struct TaskSpec {
    pub name: String,
    pub description: String,
    pub kind: TaskKind,
    pub priority: TaskPriority,
    pub dependencies: HashSet<TaskId>,
    pub max_retries: u32,
    pub timeout: Option<Duration>,
    /// Free-form labels; the scheduler attaches no meaning to them.
    pub tags: BTreeSet<String>,
}

impl TaskSpec {
    /// Spec with the given name and defaults for everything else.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Full task record as held by the registry.
///
/// Snapshots handed out by the API are clones; mutating them has no effect
/// on the scheduler's own state.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub description: String,
    pub kind: TaskKind,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub created_at: Instant,
    /// Start of the most recent execution attempt.
    pub started_at: Option<Instant>,
    /// Set exactly once, when the task first reaches a terminal state.
    pub completed_at: Option<Instant>,
    /// Wall-clock duration of the last finished attempt.
    pub duration: Option<Duration>,
    pub result: Option<serde_json::Value>,
    /// Failure of the last attempt; cleared on success.
    pub error: Option<TaskError>,
    pub dependencies: HashSet<TaskId>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub timeout: Duration,
    pub tags: BTreeSet<String>,
}

/// Outcome record of a single finished execution attempt.
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub success: bool,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub execution_time: Duration,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Caller-supplied description of a workflow.
///
/// `tasks` lists already-created member task IDs; `dependencies` adds
/// edges *within* the workflow, merged (union, not override) into each
/// member task's own dependency set.
#[derive(Debug, Clone, Default)]
pub struct WorkflowSpec {
    pub name: String,
    pub description: String,
    pub tasks: Vec<TaskId>,
    pub dependencies: HashMap<TaskId, HashSet<TaskId>>,
}

impl WorkflowSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Registered workflow record.
#[derive(Debug, Clone)]
pub struct Workflow {
    pub id: WorkflowId,
    pub name: String,
    pub description: String,
    pub tasks: Vec<TaskId>,
    pub dependencies: HashMap<TaskId, HashSet<TaskId>>,
}

/// Workflow status, always derived from constituent task statuses and
/// never stored independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_ordering_matches_scheduling_order() {
        assert!(TaskPriority::Low < TaskPriority::Normal);
        assert!(TaskPriority::Normal < TaskPriority::High);
        assert!(TaskPriority::High < TaskPriority::Critical);
        assert!(TaskPriority::Critical < TaskPriority::Urgent);
    }

    #[test]
    fn terminal_states() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
    }

    #[test]
    fn status_serializes_screaming_snake_case() {
        let s = serde_json::to_string(&TaskStatus::Running).unwrap();
        assert_eq!(s, "\"RUNNING\"");
        let k: TaskKind = serde_json::from_str("\"NETWORK\"").unwrap();
        assert_eq!(k, TaskKind::Network);
    }
}
