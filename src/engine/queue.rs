// src/engine/queue.rs

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use tracing::debug;

use crate::task::{TaskId, TaskPriority};

/// One queued ready task.
///
/// Ordering is `(priority desc, enqueue sequence asc)`: the heap yields the
/// highest priority first and breaks ties strictly first-in-first-out via a
/// monotone sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct QueueEntry {
    priority: TaskPriority,
    seq: u64,
    id: TaskId,
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Priority-ordered queue of task IDs that are eligible to run.
///
/// The queue holds IDs only; whether an entry is still runnable is decided
/// by the registry at dispatch time: a cancelled task stays in the heap
/// as a tombstone and is silently discarded on pop-side revalidation,
/// since a binary heap has no cheap arbitrary removal.
#[derive(Debug, Default)]
pub(crate) struct ReadyQueue {
    heap: BinaryHeap<QueueEntry>,
    queued: HashSet<TaskId>,
    seq: u64,
}

impl ReadyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a task. A task already in the queue is not queued twice.
    pub fn push(&mut self, id: TaskId, priority: TaskPriority) {
        if !self.queued.insert(id) {
            debug!(task = %id, "task already queued; ignoring duplicate enqueue");
            return;
        }
        self.seq += 1;
        self.heap.push(QueueEntry {
            priority,
            seq: self.seq,
            id,
        });
    }

    /// Dequeue the highest-priority, oldest entry.
    pub fn pop(&mut self) -> Option<TaskId> {
        let entry = self.heap.pop()?;
        self.queued.remove(&entry.id);
        Some(entry.id)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
