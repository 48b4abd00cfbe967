//! Deferred task scheduling against the audio clock.
//!
//! Orchestration never blocks; work is queued with a sample-domain deadline
//! and drained by `pop_due` whenever the clock advances. Every scheduled
//! task gets a unique id that acts as its cancellation token.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

/// Cancellation token for a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

struct Entry<T> {
    at: u64,
    id: TaskId,
    payload: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.id == other.id
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the earliest deadline sits at the heap root; ties
        // break in scheduling order.
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// A queue of deferred tasks ordered by deadline.
///
/// Deadlines are absolute positions on the audio clock, in samples.
pub struct TaskQueue<T> {
    heap: BinaryHeap<Entry<T>>,
    cancelled: HashSet<TaskId>,
    next_id: u64,
}

impl<T> TaskQueue<T> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            cancelled: HashSet::new(),
            next_id: 0,
        }
    }

    /// Schedules a task to run once the clock reaches `at`.
    pub fn schedule(&mut self, at: u64, payload: T) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.heap.push(Entry { at, id, payload });
        id
    }

    /// Cancels a pending task. Returns false when the task already ran,
    /// was already cancelled, or never existed.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        let pending = self
            .heap
            .iter()
            .any(|e| e.id == id && !self.cancelled.contains(&id));
        if pending {
            self.cancelled.insert(id);
        }
        pending
    }

    /// Drops every pending task.
    pub fn clear(&mut self) {
        self.heap.clear();
        self.cancelled.clear();
    }

    /// Number of pending (not cancelled) tasks.
    pub fn pending(&self) -> usize {
        self.heap
            .iter()
            .filter(|e| !self.cancelled.contains(&e.id))
            .count()
    }

    /// Deadline of the earliest pending task, if any.
    pub fn next_deadline(&self) -> Option<u64> {
        self.heap
            .iter()
            .filter(|e| !self.cancelled.contains(&e.id))
            .map(|e| e.at)
            .min()
    }

    /// Pops the earliest pending task whose deadline has been reached.
    pub fn pop_due(&mut self, now: u64) -> Option<T> {
        loop {
            match self.heap.peek() {
                Some(entry) if entry.at <= now => {}
                _ => return None,
            }
            if let Some(entry) = self.heap.pop() {
                if self.cancelled.remove(&entry.id) {
                    continue;
                }
                return Some(entry.payload);
            }
        }
    }
}

impl<T> Default for TaskQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
