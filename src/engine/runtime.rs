// src/engine/runtime.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::engine::events::SchedulerEvent;
use crate::engine::queue::ReadyQueue;
use crate::errors::TaskError;
use crate::exec::harness::{self, AttemptOutcome};
use crate::scheduler::Shared;
use crate::task::TaskId;

/// Events fed into the engine loop.
///
/// - the facade sends `TaskReady` (submission, workflow registration)
/// - the execution harness sends `AttemptFinished`
/// - retry delay timers send `RetryDue`
/// - `shutdown` sends `Shutdown`
#[derive(Debug)]
pub(crate) enum EngineEvent {
    /// A submitted task whose dependencies are all completed.
    TaskReady(TaskId),
    AttemptFinished {
        task: TaskId,
        outcome: AttemptOutcome,
    },
    /// A retry delay elapsed; the task may be re-queued if still pending.
    RetryDue(TaskId),
    Shutdown,
}

/// The scheduler engine: a single owning event loop.
///
/// It alone touches the ready queue and the slot count, so priority order
/// and the concurrency bound need no further synchronization. The registry
/// is shared with the facade behind its mutex and only locked for short,
/// await-free sections.
pub(crate) struct Engine {
    shared: Arc<Shared>,
    rx: mpsc::UnboundedReceiver<EngineEvent>,
    /// Handed to harness attempts and retry timers so their results flow
    /// back through the same loop.
    tx: mpsc::UnboundedSender<EngineEvent>,
    queue: ReadyQueue,
    /// Occupied execution slots, never above `max_concurrent_tasks`.
    running: usize,
    /// Set on shutdown: stop dispatching, let running work finish.
    draining: bool,
}

impl Engine {
    pub fn new(
        shared: Arc<Shared>,
        rx: mpsc::UnboundedReceiver<EngineEvent>,
        tx: mpsc::UnboundedSender<EngineEvent>,
    ) -> Self {
        Self {
            shared,
            rx,
            tx,
            queue: ReadyQueue::new(),
            running: 0,
            draining: false,
        }
    }

    /// Main event loop. Exits once a shutdown was requested and all
    /// running tasks have finished naturally.
    pub async fn run(mut self) {
        debug!("scheduler engine started");

        while let Some(event) = self.rx.recv().await {
            trace!(?event, "engine event");

            match event {
                EngineEvent::TaskReady(id) => self.handle_ready(id),
                EngineEvent::AttemptFinished { task, outcome } => {
                    self.handle_finished(task, outcome)
                }
                EngineEvent::RetryDue(id) => {
                    debug!(task = %id, "retry delay elapsed");
                    self.handle_ready(id);
                }
                EngineEvent::Shutdown => {
                    info!(running = self.running, queued = self.queue.len(), "draining");
                    self.draining = true;
                }
            }

            self.dispatch();

            if self.draining && self.running == 0 {
                break;
            }
        }

        info!("scheduler engine stopped");
    }

    /// Queue a task if the registry confirms it is still pending,
    /// submitted, and dependency-free.
    fn handle_ready(&mut self, id: TaskId) {
        let priority = self.shared.registry().ready_priority(id);
        match priority {
            Some(priority) => self.queue.push(id, priority),
            None => debug!(task = %id, "not ready; ignoring"),
        }
    }

    /// Fill free execution slots from the ready queue, discarding
    /// tombstoned entries.
    fn dispatch(&mut self) {
        if self.draining {
            return;
        }

        while self.running < self.shared.config.max_concurrent_tasks {
            let Some(id) = self.queue.pop() else {
                break;
            };

            let attempt = self.shared.registry().begin_attempt(id);
            let Some((ctx, executable, timeout)) = attempt else {
                // Cancelled (or otherwise stale) while queued.
                continue;
            };

            self.running += 1;
            debug!(task = %id, attempt = ctx.attempt, running = self.running, "task started");
            self.shared.events.emit(SchedulerEvent::TaskStarted {
                task: id,
                attempt: ctx.attempt,
            });
            harness::spawn_attempt(id, ctx, executable, timeout, self.tx.clone());
        }
    }

    fn handle_finished(&mut self, id: TaskId, outcome: AttemptOutcome) {
        self.running -= 1;

        match outcome {
            AttemptOutcome::Success { value, elapsed } => {
                let newly_eligible = {
                    let mut registry = self.shared.registry();
                    registry.complete(id, value, elapsed);
                    registry.newly_eligible_after(id)
                };

                info!(task = %id, ?elapsed, "task completed");
                self.shared
                    .events
                    .emit(SchedulerEvent::TaskCompleted { task: id });

                for (dependent, priority) in newly_eligible {
                    debug!(task = %dependent, upstream = %id, "dependent became eligible");
                    self.queue.push(dependent, priority);
                }
            }
            AttemptOutcome::Failed { error, elapsed } => self.handle_failure(id, error, elapsed),
        }
    }

    /// Retry coordination: re-queue after a delay while budget remains,
    /// terminal failure (plus cascade-cancel of dependents) otherwise.
    fn handle_failure(&mut self, id: TaskId, error: TaskError, elapsed: Duration) {
        let mut registry = self.shared.registry();

        if registry.can_retry(id) {
            let retry_count = registry.schedule_retry(id, error.clone(), elapsed);
            drop(registry);

            warn!(task = %id, %error, retry_count, "attempt failed; retrying after delay");
            let tx = self.tx.clone();
            let delay = self.shared.config.retry_delay;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = tx.send(EngineEvent::RetryDue(id));
            });
        } else {
            registry.fail(id, error.clone(), elapsed);
            let cancelled = registry.cascade_cancel(id);
            drop(registry);

            warn!(task = %id, %error, "task failed permanently");
            self.shared.events.emit(SchedulerEvent::TaskFailed {
                task: id,
                error: error.to_string(),
            });
            for dependent in cancelled {
                self.shared
                    .events
                    .emit(SchedulerEvent::TaskCancelled { task: dependent });
            }
        }
    }
}
