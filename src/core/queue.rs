//! Blocking task queue shared by submitters and workers.
//!
//! The queue is the only mutable structure submitters and workers share. Every
//! access goes through one `parking_lot::Mutex`, so a pending item is handed to
//! exactly one dequeuer. Idle workers park on a `Condvar` and are woken by
//! `enqueue` (one waiter) or `close` (all waiters).

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

use parking_lot::{Condvar, Mutex};

use crate::config::QueueOrder;
use crate::core::error::SchedulerError;
use crate::core::task::Priority;

/// Entry ordered by priority (highest first), FIFO within a priority.
struct PriorityEntry<T> {
    priority: Priority,
    seq: u64,
    item: T,
}

impl<T> PartialEq for PriorityEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl<T> Eq for PriorityEntry<T> {}

impl<T> PartialOrd for PriorityEntry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for PriorityEntry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.priority.cmp(&other.priority) {
            // Earlier arrival wins (reversed for max-heap)
            Ordering::Equal => other.seq.cmp(&self.seq),
            other => other,
        }
    }
}

enum Storage<T> {
    Fifo(VecDeque<T>),
    Priority(BinaryHeap<PriorityEntry<T>>),
}

impl<T> Storage<T> {
    fn len(&self) -> usize {
        match self {
            Self::Fifo(items) => items.len(),
            Self::Priority(heap) => heap.len(),
        }
    }

    fn pop(&mut self) -> Option<T> {
        match self {
            Self::Fifo(items) => items.pop_front(),
            Self::Priority(heap) => heap.pop().map(|entry| entry.item),
        }
    }
}

struct QueueState<T> {
    storage: Storage<T>,
    closed: bool,
    next_seq: u64,
}

/// Result of a blocking dequeue.
#[derive(Debug, PartialEq, Eq)]
pub enum Dequeued<T> {
    /// The next pending item.
    Task(T),
    /// The queue is closed and empty; the caller should stop dequeuing.
    Closed,
}

/// Thread-safe FIFO or priority queue with close/drain semantics.
pub struct TaskQueue<T> {
    state: Mutex<QueueState<T>>,
    available: Condvar,
    max_depth: Option<usize>,
}

impl<T> TaskQueue<T> {
    /// Create a queue. `max_depth = None` makes it unbounded.
    #[must_use]
    pub fn new(order: QueueOrder, max_depth: Option<usize>) -> Self {
        let capacity = max_depth.unwrap_or(0).min(1024);
        let storage = match order {
            QueueOrder::Fifo => Storage::Fifo(VecDeque::with_capacity(capacity)),
            QueueOrder::Priority => Storage::Priority(BinaryHeap::with_capacity(capacity)),
        };
        Self {
            state: Mutex::new(QueueState {
                storage,
                closed: false,
                next_seq: 0,
            }),
            available: Condvar::new(),
            max_depth,
        }
    }

    /// Append an item. In FIFO mode `priority` is ignored.
    ///
    /// # Errors
    ///
    /// - `SchedulerError::QueueClosed` once [`close`](Self::close) was called
    /// - `SchedulerError::QueueFull` if a bounded queue is at capacity
    pub fn enqueue(&self, priority: Priority, item: T) -> Result<(), SchedulerError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(SchedulerError::QueueClosed);
        }
        if let Some(max) = self.max_depth {
            if state.storage.len() >= max {
                return Err(SchedulerError::QueueFull);
            }
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        match &mut state.storage {
            Storage::Fifo(items) => items.push_back(item),
            Storage::Priority(heap) => heap.push(PriorityEntry { priority, seq, item }),
        }
        drop(state);
        self.available.notify_one();
        Ok(())
    }

    /// Take the next item, parking the caller while the queue is empty and open.
    ///
    /// Returns [`Dequeued::Closed`] once the queue is closed and nothing remains,
    /// so pending work is always drained before workers exit.
    pub fn dequeue_blocking(&self) -> Dequeued<T> {
        let mut state = self.state.lock();
        loop {
            if let Some(item) = state.storage.pop() {
                return Dequeued::Task(item);
            }
            if state.closed {
                return Dequeued::Closed;
            }
            self.available.wait(&mut state);
        }
    }

    /// Take the next item without blocking.
    pub fn try_dequeue(&self) -> Option<T> {
        self.state.lock().storage.pop()
    }

    /// Stop accepting items and wake every parked dequeuer.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.available.notify_all();
    }

    /// Remove and return every pending item in dequeue order.
    pub fn drain(&self) -> Vec<T> {
        let mut state = self.state.lock();
        let mut items = Vec::with_capacity(state.storage.len());
        while let Some(item) = state.storage.pop() {
            items.push(item);
        }
        items
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Number of pending items.
    pub fn len(&self) -> usize {
        self.state.lock().storage.len()
    }

    /// Whether no items are pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured depth limit, if bounded.
    pub const fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }
}
