// src/task/mod.rs

//! Task and workflow data model plus the owning registry.
//!
//! - [`model`] defines the immutable identity / mutable state records.
//! - [`registry`] is the single source of truth guarding every state
//!   transition.

pub mod model;
pub(crate) mod registry;

pub use model::{
    Task, TaskId, TaskKind, TaskPriority, TaskResult, TaskSpec, TaskStatus, Workflow, WorkflowId,
    WorkflowSpec, WorkflowStatus,
};
pub use registry::SchedulerStats;
