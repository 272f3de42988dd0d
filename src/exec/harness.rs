// src/exec/harness.rs

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::engine::runtime::EngineEvent;
use crate::errors::TaskError;
use crate::task::TaskId;

/// Context handed to an executable for one attempt.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub task_id: TaskId,
    /// Zero-based attempt index; equals the task's `retry_count` at
    /// dispatch time.
    pub attempt: u32,
    pub tags: BTreeSet<String>,
}

/// Runnable logic bound to a task at submit time.
///
/// The task record itself carries no executable code; callers supply an
/// implementation of this trait (or a plain async closure, via the blanket
/// impl below). The returned value becomes the task's `result` payload.
#[async_trait]
pub trait Executable: Send + Sync {
    async fn execute(&self, ctx: TaskContext) -> anyhow::Result<serde_json::Value>;
}

#[async_trait]
impl<F, Fut> Executable for F
where
    F: Fn(TaskContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<serde_json::Value>> + Send,
{
    async fn execute(&self, ctx: TaskContext) -> anyhow::Result<serde_json::Value> {
        (self)(ctx).await
    }
}

/// Outcome of a single execution attempt, as reported to the engine.
#[derive(Debug)]
pub(crate) enum AttemptOutcome {
    Success {
        value: serde_json::Value,
        elapsed: Duration,
    },
    Failed {
        error: TaskError,
        elapsed: Duration,
    },
}

/// Run one attempt in its own tokio task.
///
/// The attempt is bounded by `timeout`: on expiry the slot abandons the
/// wait (the future is dropped at its next await point; nothing is killed
/// mid-instruction) and the attempt counts as a timeout failure. All
/// outcomes, including channel errors, end up as an `AttemptFinished`
/// event so the engine's slot accounting stays correct.
pub(crate) fn spawn_attempt(
    id: TaskId,
    ctx: TaskContext,
    executable: Arc<dyn Executable>,
    timeout: Duration,
    engine_tx: mpsc::UnboundedSender<EngineEvent>,
) {
    tokio::spawn(async move {
        debug!(task = %id, attempt = ctx.attempt, ?timeout, "attempt starting");
        let started = Instant::now();

        let outcome = match tokio::time::timeout(timeout, executable.execute(ctx)).await {
            Ok(Ok(value)) => AttemptOutcome::Success {
                value,
                elapsed: started.elapsed(),
            },
            Ok(Err(err)) => AttemptOutcome::Failed {
                error: TaskError::Execution(format!("{err:#}")),
                elapsed: started.elapsed(),
            },
            Err(_elapsed) => AttemptOutcome::Failed {
                error: TaskError::Timeout(timeout),
                elapsed: started.elapsed(),
            },
        };

        if engine_tx
            .send(EngineEvent::AttemptFinished { task: id, outcome })
            .is_err()
        {
            // Engine already gone; only possible during shutdown teardown.
            error!(task = %id, "engine channel closed; dropping attempt outcome");
        }
    });
}
