//! Ready queues: bounded LIFOs of task ids whose fan-in reached zero.
//!
//! One queue per worker class. Push and pop are mutex-guarded; an atomic
//! count gives dispatchers a lock-free "anything there?" check before they
//! pay for the lock. LIFO keeps recently produced work warm; fairness is
//! not needed because the graph is finite and drains completely.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::runtime::graph::{CoreType, TaskId};

/// A bounded multi-producer / multi-consumer LIFO of task ids.
#[derive(Debug)]
pub struct ReadyQueue {
    slots: Mutex<Vec<TaskId>>,
    count: AtomicUsize,
    capacity: usize,
}

impl ReadyQueue {
    /// Create a queue holding at most `capacity` ids.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Mutex::new(Vec::with_capacity(capacity)),
            count: AtomicUsize::new(0),
            capacity,
        }
    }

    /// Push a task id. Returns `false` if the queue is full, which cannot
    /// happen when the capacity equals the graph size and every task is
    /// enqueued at most once.
    pub fn push(
        &self,
        id: TaskId,
    ) -> bool {
        let mut slots = self.slots.lock().unwrap();
        if slots.len() >= self.capacity {
            return false;
        }
        slots.push(id);
        self.count.fetch_add(1, Ordering::Release);
        true
    }

    /// Pop the most recently pushed id, if any.
    pub fn try_pop(&self) -> Option<TaskId> {
        if self.count.load(Ordering::Acquire) == 0 {
            return None;
        }
        let mut slots = self.slots.lock().unwrap();
        let id = slots.pop()?;
        self.count.fetch_sub(1, Ordering::Release);
        Some(id)
    }

    /// Number of queued ids.
    #[inline]
    pub fn len(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Check if the queue is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The per-class pair of ready queues.
#[derive(Debug)]
pub struct ReadyQueues {
    compute: ReadyQueue,
    vector: ReadyQueue,
}

impl ReadyQueues {
    /// Create both queues with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            compute: ReadyQueue::new(capacity),
            vector: ReadyQueue::new(capacity),
        }
    }

    /// The queue feeding workers of `class`.
    #[inline]
    pub fn for_class(
        &self,
        class: CoreType,
    ) -> &ReadyQueue {
        match class {
            CoreType::Compute => &self.compute,
            CoreType::Vector => &self.vector,
        }
    }
}

#[cfg(test)]
mod tests;
