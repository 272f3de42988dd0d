// src/scheduler.rs

//! Public scheduler facade.
//!
//! A [`Scheduler`] owns its registry, ready queue and worker slots; there
//! are no process-wide singletons. Construct one inside a tokio runtime,
//! pass it by reference (or clone the handle into an `Arc`) to anything
//! that needs to create or inspect tasks, and call [`Scheduler::shutdown`]
//! to drain and join the engine.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::SchedulerConfig;
use crate::engine::events::{EventBus, SchedulerEvent};
use crate::engine::runtime::{Engine, EngineEvent};
use crate::errors::{Result, SchedulerError};
use crate::exec::Executable;
use crate::task::registry::Registry;
use crate::task::{
    SchedulerStats, Task, TaskId, TaskResult, TaskSpec, TaskStatus, Workflow, WorkflowId,
    WorkflowSpec, WorkflowStatus,
};

/// State shared between the facade and the engine loop.
pub(crate) struct Shared {
    registry: Mutex<Registry>,
    pub config: SchedulerConfig,
    pub events: EventBus,
}

impl Shared {
    /// Lock the registry. Critical sections are short and never held
    /// across an await, so a poisoned lock (a panic inside one of those
    /// sections) leaves consistent-enough state to keep serving reads.
    pub fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Dependency-aware concurrent task scheduler.
///
/// ```no_run
/// use std::sync::Arc;
/// use taskdag::{Scheduler, SchedulerConfig, TaskContext, TaskSpec};
///
/// # async fn demo() -> taskdag::Result<()> {
/// let scheduler = Scheduler::new(SchedulerConfig::default())?;
/// let build = scheduler.create_task(TaskSpec::named("build"))?;
/// scheduler.submit(
///     build,
///     Arc::new(|_ctx: TaskContext| async move { anyhow::Ok(serde_json::json!("artifact")) }),
/// )?;
/// # Ok(())
/// # }
/// ```
pub struct Scheduler {
    shared: Arc<Shared>,
    tx: mpsc::UnboundedSender<EngineEvent>,
    engine: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    /// Create a scheduler and spawn its engine loop.
    ///
    /// Must be called within a tokio runtime.
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        config.validate()?;

        let shared = Arc::new(Shared {
            registry: Mutex::new(Registry::new()),
            events: EventBus::new(config.event_buffer),
            config,
        });

        let (tx, rx) = mpsc::unbounded_channel();
        let engine = Engine::new(Arc::clone(&shared), rx, tx.clone());
        let handle = tokio::spawn(engine.run());
        debug!("scheduler created");

        Ok(Self {
            shared,
            tx,
            engine: Mutex::new(Some(handle)),
        })
    }

    /// Validate and register a new task. The task starts `Pending` and is
    /// not enqueued until [`Scheduler::submit`] binds runnable logic to it.
    pub fn create_task(&self, spec: TaskSpec) -> Result<TaskId> {
        self.ensure_open()?;
        let id = self
            .shared
            .registry()
            .create_task(spec, self.shared.config.task_timeout_default)?;
        self.shared
            .events
            .emit(SchedulerEvent::TaskCreated { task: id });
        Ok(id)
    }

    /// Bind runnable logic to a created task, making it eligible to run as
    /// soon as its dependencies allow.
    pub fn submit(&self, id: TaskId, executable: Arc<dyn Executable>) -> Result<()> {
        self.ensure_open()?;
        let eligible = {
            let mut registry = self.shared.registry();
            registry.bind_executable(id, executable)?;
            registry.ready_priority(id).is_some()
        };
        if eligible {
            self.send(EngineEvent::TaskReady(id))?;
        }
        Ok(())
    }

    /// Cancel a task that has not started running yet.
    ///
    /// Returns `false` (a no-op, not an error) if the task is already
    /// running or terminal; running work cannot be preempted.
    pub fn cancel_task(&self, id: TaskId) -> bool {
        let cancelled = self.shared.registry().cancel(id);
        if cancelled {
            self.shared
                .events
                .emit(SchedulerEvent::TaskCancelled { task: id });
        }
        cancelled
    }

    pub fn task_status(&self, id: TaskId) -> Result<TaskStatus> {
        Ok(self.shared.registry().task(id)?.status)
    }

    /// Snapshot of the full task record.
    pub fn task_info(&self, id: TaskId) -> Result<Task> {
        self.shared.registry().snapshot(id)
    }

    /// Record of the most recent finished execution attempt, if any.
    pub fn task_result(&self, id: TaskId) -> Result<Option<TaskResult>> {
        self.shared.registry().last_result(id)
    }

    /// Snapshot copies of all tasks currently in `status`.
    pub fn list_by_status(&self, status: TaskStatus) -> Vec<Task> {
        self.shared.registry().list_by_status(status)
    }

    /// Register a workflow over already-created tasks. Members that are
    /// submitted and dependency-free are enqueued immediately; the rest
    /// wait for dependency resolution (or for their own submission).
    pub fn create_workflow(&self, spec: WorkflowSpec) -> Result<WorkflowId> {
        self.ensure_open()?;
        let (id, ready) = self.shared.registry().create_workflow(spec)?;
        self.shared
            .events
            .emit(SchedulerEvent::WorkflowCreated { workflow: id });
        for (task, _priority) in ready {
            self.send(EngineEvent::TaskReady(task))?;
        }
        Ok(id)
    }

    /// Workflow status, derived from constituent task statuses.
    pub fn workflow_status(&self, id: WorkflowId) -> Result<WorkflowStatus> {
        self.shared.registry().workflow_status(id)
    }

    pub fn workflow_info(&self, id: WorkflowId) -> Result<Workflow> {
        self.shared.registry().workflow(id).cloned()
    }

    /// Subscribe to lifecycle events. Best-effort: a receiver that falls
    /// more than the configured buffer behind loses the oldest events.
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.shared.events.subscribe()
    }

    /// Current task counts per status.
    pub fn stats(&self) -> SchedulerStats {
        self.shared.registry().stats()
    }

    /// Graceful shutdown: stop dispatching queued work, let running tasks
    /// finish naturally, then join the engine loop. Idempotent.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(EngineEvent::Shutdown);
        let handle = self.engine.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.tx.is_closed() {
            return Err(SchedulerError::Shutdown);
        }
        Ok(())
    }

    fn send(&self, event: EngineEvent) -> Result<()> {
        self.tx.send(event).map_err(|_| SchedulerError::Shutdown)
    }
}
