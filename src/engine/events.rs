// src/engine/events.rs

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

use crate::task::{TaskId, WorkflowId};

/// Lifecycle notifications delivered to subscribers.
///
/// Delivery is best-effort and asynchronous: a slow subscriber lags and
/// loses the oldest events instead of ever blocking the scheduler.
/// `TaskFailed` is emitted only for terminal failure (retries exhausted);
/// retried attempts are visible via logging, not events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SchedulerEvent {
    TaskCreated { task: TaskId },
    TaskStarted { task: TaskId, attempt: u32 },
    TaskCompleted { task: TaskId },
    TaskFailed { task: TaskId, error: String },
    TaskCancelled { task: TaskId },
    WorkflowCreated { workflow: WorkflowId },
}

/// Fan-out of [`SchedulerEvent`]s over a bounded broadcast channel.
pub(crate) struct EventBus {
    tx: broadcast::Sender<SchedulerEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.tx.subscribe()
    }

    /// Emit an event. Having no subscribers is not an error.
    pub fn emit(&self, event: SchedulerEvent) {
        trace!(?event, "emitting scheduler event");
        let _ = self.tx.send(event);
    }
}
