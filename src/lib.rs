// src/lib.rs

//! Dependency-aware concurrent task scheduler.
//!
//! Tasks are created with a priority, an optional set of dependencies, a
//! retry budget and a timeout, then bound to runnable logic via
//! [`Scheduler::submit`]. A bounded pool of worker slots executes eligible
//! tasks in strict priority-then-FIFO order; failures are retried with a
//! delay until the budget runs out, and completions make dependents
//! eligible. Workflows group tasks under an additional dependency map.
//!
//! Everything is in-process: no persistence, no distribution, and no
//! preemption of running work (cancellation is cooperative).

pub mod config;
mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod scheduler;
pub mod task;

pub use config::SchedulerConfig;
pub use engine::SchedulerEvent;
pub use errors::{Result, SchedulerError, TaskError};
pub use exec::{Executable, TaskContext};
pub use scheduler::Scheduler;
pub use task::{
    SchedulerStats, Task, TaskId, TaskKind, TaskPriority, TaskResult, TaskSpec, TaskStatus,
    Workflow, WorkflowId, WorkflowSpec, WorkflowStatus,
};
