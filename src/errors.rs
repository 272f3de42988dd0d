// src/errors.rs

//! Crate-wide error types.
//!
//! [`SchedulerError`] is what the public API returns synchronously to the
//! caller of an offending operation; it never describes the outcome of a
//! task's own execution. [`TaskError`] is the failure kind recorded on a
//! task attempt and routed through the retry coordinator. Retry exhaustion
//! is not a separate error: it surfaces as a terminal `Failed` status with
//! the last [`TaskError`] kept in the task's `error` field.

use std::time::Duration;

use thiserror::Error;

use crate::task::{TaskId, WorkflowId};

/// Errors returned by the scheduler's public API.
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// Malformed task or workflow spec (empty name, duplicate members, ...).
    #[error("invalid spec: {0}")]
    Validation(String),

    /// Unknown or cyclic dependency reference.
    #[error("dependency error: {0}")]
    Dependency(String),

    /// Unknown task ID.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// Unknown workflow ID.
    #[error("workflow not found: {0}")]
    WorkflowNotFound(WorkflowId),

    /// The scheduler engine has been shut down and accepts no new work.
    #[error("scheduler is shut down")]
    Shutdown,
}

/// Failure kind of a single task execution attempt.
///
/// Captured per task, never propagated out of the scheduler: one task's
/// failure must not abort the pool or other tasks.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// The task's own logic returned an error.
    #[error("execution failed: {0}")]
    Execution(String),

    /// The attempt did not return within the task's timeout.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
