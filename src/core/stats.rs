//! Scheduler statistics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Statistics about scheduler utilization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    /// Number of worker threads.
    pub worker_count: usize,
    /// Currently executing tasks.
    pub active_tasks: u64,
    /// Tasks waiting in the queue.
    pub queued_tasks: u64,
    /// Total tasks accepted by `submit`.
    pub submitted_tasks: u64,
    /// Total tasks that completed successfully.
    pub completed_tasks: u64,
    /// Total tasks that failed or panicked.
    pub failed_tasks: u64,
    /// Total tasks cancelled, queued or running.
    pub cancelled_tasks: u64,
    /// Of the failed tasks, how many panicked.
    pub panicked_tasks: u64,
    /// Accumulated execution time in microseconds.
    pub total_run_micros: u64,
    /// Longest single execution in microseconds.
    pub max_run_micros: u64,
}

/// Internal counters for scheduler statistics (thread-safe).
#[derive(Debug, Default)]
pub(crate) struct SchedulerCounters {
    pub active_tasks: AtomicU64,
    pub queued_tasks: AtomicU64,
    pub submitted_tasks: AtomicU64,
    pub completed_tasks: AtomicU64,
    pub failed_tasks: AtomicU64,
    pub cancelled_tasks: AtomicU64,
    pub panicked_tasks: AtomicU64,
    pub total_run_micros: AtomicU64,
    pub max_run_micros: AtomicU64,
}

impl SchedulerCounters {
    /// Fold one execution time into the totals.
    pub fn record_run_time(&self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.total_run_micros.fetch_add(micros, Ordering::Relaxed);
        self.max_run_micros.fetch_max(micros, Ordering::Relaxed);
    }

    /// Get a snapshot of current statistics.
    pub fn snapshot(&self, worker_count: usize) -> SchedulerStats {
        SchedulerStats {
            worker_count,
            active_tasks: self.active_tasks.load(Ordering::Relaxed),
            queued_tasks: self.queued_tasks.load(Ordering::Relaxed),
            submitted_tasks: self.submitted_tasks.load(Ordering::Relaxed),
            completed_tasks: self.completed_tasks.load(Ordering::Relaxed),
            failed_tasks: self.failed_tasks.load(Ordering::Relaxed),
            cancelled_tasks: self.cancelled_tasks.load(Ordering::Relaxed),
            panicked_tasks: self.panicked_tasks.load(Ordering::Relaxed),
            total_run_micros: self.total_run_micros.load(Ordering::Relaxed),
            max_run_micros: self.max_run_micros.load(Ordering::Relaxed),
        }
    }
}
