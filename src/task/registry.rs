// src/task/registry.rs

//! Single source of truth for task and workflow records.
//!
//! The registry owns every `Task` for its entire life and is only ever
//! touched behind the scheduler's synchronization boundary (one mutex in
//! [`crate::scheduler`]). Every legal state transition of the task state
//! machine is a method here; callers outside this module cannot mutate a
//! task at all, they only receive snapshot clones.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::dag::graph::DepGraph;
use crate::dag::resolver;
use crate::errors::{Result, SchedulerError, TaskError};
use crate::exec::harness::TaskContext;
use crate::exec::Executable;
use crate::task::model::{
    Task, TaskId, TaskPriority, TaskResult, TaskSpec, TaskStatus, Workflow, WorkflowId,
    WorkflowSpec, WorkflowStatus,
};

/// Snapshot counts of scheduler state, derived on demand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

#[derive(Default)]
pub(crate) struct Registry {
    tasks: HashMap<TaskId, Task>,
    workflows: HashMap<WorkflowId, Workflow>,
    /// Runnable logic bound via `submit`; a task without an entry here is
    /// not yet runnable even if its dependencies are satisfied.
    executables: HashMap<TaskId, Arc<dyn Executable>>,
    /// Latest finished-attempt record per task.
    results: HashMap<TaskId, TaskResult>,
    graph: DepGraph,
    next_task_id: u64,
    next_workflow_id: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- creation & lookup -------------------------------------------------

    /// Validate and insert a new `Pending` task. Does not enqueue it.
    pub fn create_task(&mut self, spec: TaskSpec, default_timeout: Duration) -> Result<TaskId> {
        if spec.name.trim().is_empty() {
            return Err(SchedulerError::Validation(
                "task name must not be empty".to_string(),
            ));
        }

        for dep in &spec.dependencies {
            if !self.tasks.contains_key(dep) {
                return Err(SchedulerError::Dependency(format!(
                    "task '{}' references unknown dependency {dep}",
                    spec.name
                )));
            }
        }

        let candidate = TaskId(self.next_task_id);
        let extra: Vec<(TaskId, TaskId)> = spec
            .dependencies
            .iter()
            .map(|&dep| (dep, candidate))
            .collect();
        resolver::ensure_acyclic(&self.graph, &extra)?;

        self.next_task_id += 1;
        let task = Task {
            id: candidate,
            name: spec.name,
            description: spec.description,
            kind: spec.kind,
            priority: spec.priority,
            status: TaskStatus::Pending,
            created_at: Instant::now(),
            started_at: None,
            completed_at: None,
            duration: None,
            result: None,
            error: None,
            dependencies: spec.dependencies.clone(),
            retry_count: 0,
            max_retries: spec.max_retries,
            timeout: spec.timeout.unwrap_or(default_timeout),
            tags: spec.tags,
        };

        debug!(task = %candidate, name = %task.name, "task created");
        self.graph.insert(candidate, &spec.dependencies);
        self.tasks.insert(candidate, task);
        Ok(candidate)
    }

    pub fn task(&self, id: TaskId) -> Result<&Task> {
        self.tasks.get(&id).ok_or(SchedulerError::TaskNotFound(id))
    }

    pub fn snapshot(&self, id: TaskId) -> Result<Task> {
        self.task(id).cloned()
    }

    pub fn list_by_status(&self, status: TaskStatus) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .tasks
            .values()
            .filter(|t| t.status == status)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.id);
        tasks
    }

    pub fn last_result(&self, id: TaskId) -> Result<Option<TaskResult>> {
        self.task(id)?;
        Ok(self.results.get(&id).cloned())
    }

    pub fn stats(&self) -> SchedulerStats {
        let mut stats = SchedulerStats::default();
        for task in self.tasks.values() {
            match task.status {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::Running => stats.running += 1,
                TaskStatus::Completed => stats.completed += 1,
                TaskStatus::Failed => stats.failed += 1,
                TaskStatus::Cancelled => stats.cancelled += 1,
            }
        }
        stats
    }

    // ---- submission & eligibility ------------------------------------------

    /// Bind runnable logic to an already-created task.
    pub fn bind_executable(&mut self, id: TaskId, executable: Arc<dyn Executable>) -> Result<()> {
        let task = self.tasks.get(&id).ok_or(SchedulerError::TaskNotFound(id))?;
        if task.status != TaskStatus::Pending {
            return Err(SchedulerError::Validation(format!(
                "{id} is {}; only pending tasks can be submitted",
                task.status
            )));
        }
        if self.executables.contains_key(&id) {
            return Err(SchedulerError::Validation(format!(
                "{id} has already been submitted"
            )));
        }
        self.executables.insert(id, executable);
        debug!(task = %id, "executable bound");
        Ok(())
    }

    /// Priority of a task that is ready to be queued right now: pending,
    /// submitted, and with all dependencies completed. `None` otherwise.
    pub fn ready_priority(&self, id: TaskId) -> Option<TaskPriority> {
        let task = self.tasks.get(&id)?;
        if task.status == TaskStatus::Pending
            && self.executables.contains_key(&id)
            && resolver::deps_satisfied(&self.tasks, task)
        {
            Some(task.priority)
        } else {
            None
        }
    }

    /// Tasks that became eligible because `id` just completed.
    pub fn newly_eligible_after(&self, id: TaskId) -> Vec<(TaskId, TaskPriority)> {
        self.graph
            .dependents_of(id)
            .iter()
            .filter_map(|&dep| self.ready_priority(dep).map(|p| (dep, p)))
            .collect()
    }

    // ---- state transitions -------------------------------------------------

    /// Transition `Pending -> Running` for a dequeued entry and hand back
    /// what the worker slot needs. Returns `None` for tombstoned entries
    /// (cancelled or otherwise no longer runnable), which the caller must
    /// silently discard.
    pub fn begin_attempt(
        &mut self,
        id: TaskId,
    ) -> Option<(TaskContext, Arc<dyn Executable>, Duration)> {
        let executable = self.executables.get(&id)?.clone();

        let runnable = match self.tasks.get(&id) {
            Some(task) => {
                task.status == TaskStatus::Pending && resolver::deps_satisfied(&self.tasks, task)
            }
            None => false,
        };
        if !runnable {
            debug!(task = %id, "discarding stale queue entry");
            return None;
        }

        let task = self.tasks.get_mut(&id)?;
        task.status = TaskStatus::Running;
        task.started_at = Some(Instant::now());
        let ctx = TaskContext {
            task_id: id,
            attempt: task.retry_count,
            tags: task.tags.clone(),
        };
        Some((ctx, executable, task.timeout))
    }

    /// Transition `Running -> Completed`, recording the result payload.
    pub fn complete(&mut self, id: TaskId, value: serde_json::Value, elapsed: Duration) {
        let Some(task) = self.tasks.get_mut(&id) else {
            warn!(task = %id, "completion for unknown task; ignoring");
            return;
        };
        if task.status != TaskStatus::Running {
            warn!(task = %id, status = %task.status, "completion for task not running; ignoring");
            return;
        }

        task.status = TaskStatus::Completed;
        task.duration = Some(elapsed);
        task.result = Some(value.clone());
        task.error = None;
        set_completed_once(task);

        let attempt = task.retry_count;
        self.results.insert(
            id,
            TaskResult {
                task_id: id,
                success: true,
                result: Some(value),
                error: None,
                execution_time: elapsed,
                metadata: attempt_metadata(attempt),
            },
        );
    }

    /// Whether a failed attempt may be retried.
    pub fn can_retry(&self, id: TaskId) -> bool {
        self.tasks
            .get(&id)
            .is_some_and(|t| t.status == TaskStatus::Running && t.retry_count < t.max_retries)
    }

    /// Transition `Running -> Pending` after a failed attempt with retry
    /// budget left. Returns the new retry count.
    pub fn schedule_retry(&mut self, id: TaskId, error: TaskError, elapsed: Duration) -> u32 {
        let Some(task) = self.tasks.get_mut(&id) else {
            warn!(task = %id, "retry for unknown task; ignoring");
            return 0;
        };
        if task.status != TaskStatus::Running {
            warn!(task = %id, status = %task.status, "retry for task not running; ignoring");
            return task.retry_count;
        }

        task.status = TaskStatus::Pending;
        task.retry_count += 1;
        task.duration = Some(elapsed);
        task.error = Some(error.clone());

        let attempt = task.retry_count - 1;
        let retry_count = task.retry_count;
        self.results.insert(
            id,
            TaskResult {
                task_id: id,
                success: false,
                result: None,
                error: Some(error.to_string()),
                execution_time: elapsed,
                metadata: attempt_metadata(attempt),
            },
        );
        retry_count
    }

    /// Transition `Running -> Failed` (terminal; retries exhausted).
    pub fn fail(&mut self, id: TaskId, error: TaskError, elapsed: Duration) {
        let Some(task) = self.tasks.get_mut(&id) else {
            warn!(task = %id, "failure for unknown task; ignoring");
            return;
        };
        if task.status != TaskStatus::Running {
            warn!(task = %id, status = %task.status, "failure for task not running; ignoring");
            return;
        }

        task.status = TaskStatus::Failed;
        task.duration = Some(elapsed);
        task.error = Some(error.clone());
        set_completed_once(task);

        let attempt = task.retry_count;
        self.results.insert(
            id,
            TaskResult {
                task_id: id,
                success: false,
                result: None,
                error: Some(error.to_string()),
                execution_time: elapsed,
                metadata: attempt_metadata(attempt),
            },
        );
    }

    /// Transition `Pending -> Cancelled`. Returns `false` (a no-op, not an
    /// error) for running or terminal tasks: running work cannot be
    /// preempted.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        match self.tasks.get_mut(&id) {
            Some(task) if task.status == TaskStatus::Pending => {
                task.status = TaskStatus::Cancelled;
                set_completed_once(task);
                debug!(task = %id, "task cancelled");
                true
            }
            Some(task) => {
                debug!(task = %id, status = %task.status, "cancel refused; task is not pending");
                false
            }
            None => {
                warn!(task = %id, "cancel for unknown task; ignoring");
                false
            }
        }
    }

    /// Cancel every transitively dependent task still `Pending` after
    /// `failed` reached terminal failure. Such tasks can never become
    /// eligible again. Returns the cancelled IDs.
    pub fn cascade_cancel(&mut self, failed: TaskId) -> Vec<TaskId> {
        let mut cancelled = Vec::new();
        let mut stack: Vec<TaskId> = self.graph.dependents_of(failed).to_vec();

        while let Some(id) = stack.pop() {
            if let Some(task) = self.tasks.get_mut(&id)
                && task.status == TaskStatus::Pending
            {
                task.status = TaskStatus::Cancelled;
                set_completed_once(task);
                debug!(task = %id, upstream = %failed, "cancelled due to upstream failure");
                cancelled.push(id);
                stack.extend(self.graph.dependents_of(id).iter().copied());
            }
        }

        cancelled
    }

    // ---- workflows ---------------------------------------------------------

    /// Validate and register a workflow over already-created tasks, merging
    /// its dependency map (union, not override) into the member tasks.
    ///
    /// Returns the workflow ID plus the members that are ready to queue
    /// immediately (already submitted, no unmet dependency).
    pub fn create_workflow(
        &mut self,
        spec: WorkflowSpec,
    ) -> Result<(WorkflowId, Vec<(TaskId, TaskPriority)>)> {
        if spec.name.trim().is_empty() {
            return Err(SchedulerError::Validation(
                "workflow name must not be empty".to_string(),
            ));
        }
        if spec.tasks.is_empty() {
            return Err(SchedulerError::Validation(
                "workflow must contain at least one task".to_string(),
            ));
        }

        let members: HashSet<TaskId> = spec.tasks.iter().copied().collect();
        if members.len() != spec.tasks.len() {
            return Err(SchedulerError::Validation(
                "workflow task list contains duplicates".to_string(),
            ));
        }
        for &id in &spec.tasks {
            let task = self.tasks.get(&id).ok_or(SchedulerError::TaskNotFound(id))?;
            if task.status != TaskStatus::Pending {
                return Err(SchedulerError::Validation(format!(
                    "{id} is {}; workflows may only group pending tasks",
                    task.status
                )));
            }
        }
        for (&task, deps) in &spec.dependencies {
            if !members.contains(&task) {
                return Err(SchedulerError::Dependency(format!(
                    "dependency map references {task}, which is not a workflow member"
                )));
            }
            for &dep in deps {
                if !members.contains(&dep) {
                    return Err(SchedulerError::Dependency(format!(
                        "dependency map references {dep}, which is not a workflow member"
                    )));
                }
            }
        }

        // Only edges not already declared on the task itself are new.
        let mut extra: Vec<(TaskId, TaskId)> = Vec::new();
        for (&task_id, deps) in &spec.dependencies {
            if let Some(task) = self.tasks.get(&task_id) {
                for &dep in deps {
                    if !task.dependencies.contains(&dep) {
                        extra.push((dep, task_id));
                    }
                }
            }
        }
        resolver::ensure_acyclic(&self.graph, &extra)?;

        for &(dep, task_id) in &extra {
            if let Some(task) = self.tasks.get_mut(&task_id) {
                task.dependencies.insert(dep);
            }
            self.graph.add_edge(dep, task_id);
        }

        let id = WorkflowId(self.next_workflow_id);
        self.next_workflow_id += 1;
        let workflow = Workflow {
            id,
            name: spec.name,
            description: spec.description,
            tasks: spec.tasks.clone(),
            dependencies: spec.dependencies,
        };
        debug!(workflow = %id, name = %workflow.name, tasks = workflow.tasks.len(), "workflow created");
        self.workflows.insert(id, workflow);

        let ready = spec
            .tasks
            .iter()
            .filter_map(|&t| self.ready_priority(t).map(|p| (t, p)))
            .collect();
        Ok((id, ready))
    }

    pub fn workflow(&self, id: WorkflowId) -> Result<&Workflow> {
        self.workflows
            .get(&id)
            .ok_or(SchedulerError::WorkflowNotFound(id))
    }

    /// Derive workflow status from constituent task statuses.
    ///
    /// A failed or cancelled member means the workflow can never reach
    /// all-completed, so it counts as failed.
    pub fn workflow_status(&self, id: WorkflowId) -> Result<WorkflowStatus> {
        let workflow = self.workflow(id)?;
        let members: Vec<&Task> = workflow
            .tasks
            .iter()
            .filter_map(|t| self.tasks.get(t))
            .collect();

        if members
            .iter()
            .any(|t| matches!(t.status, TaskStatus::Failed | TaskStatus::Cancelled))
        {
            return Ok(WorkflowStatus::Failed);
        }
        if members.iter().all(|t| t.status == TaskStatus::Completed) {
            return Ok(WorkflowStatus::Completed);
        }
        if members
            .iter()
            .any(|t| t.started_at.is_some() || t.status == TaskStatus::Running)
        {
            return Ok(WorkflowStatus::Running);
        }
        Ok(WorkflowStatus::Pending)
    }
}

/// `completed_at` is write-once: the first terminal transition wins.
fn set_completed_once(task: &mut Task) {
    if task.completed_at.is_none() {
        task.completed_at = Some(Instant::now());
    }
}

fn attempt_metadata(attempt: u32) -> serde_json::Map<String, serde_json::Value> {
    let mut metadata = serde_json::Map::new();
    metadata.insert("attempt".to_string(), serde_json::Value::from(attempt));
    metadata
}
