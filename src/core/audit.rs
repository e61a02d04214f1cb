//! Task lifecycle audit events and sinks.
//!
//! A scheduler reports every task transition to its [`AuditSink`], in order:
//! `Submitted`, then either `Cancelled` (never started) or `Started` followed by
//! one of `Succeeded`/`Failed`/`Cancelled` and finally `Finished`.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::task::TaskId;
use crate::util::clock::now_ms;

/// Lifecycle transition being audited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Accepted into the queue.
    Submitted,
    /// Picked up by a worker.
    Started,
    /// Returned a value.
    Succeeded,
    /// Returned an error or panicked.
    Failed,
    /// Cancelled while queued or running.
    Cancelled,
    /// Worker released the task.
    Finished,
}

/// Audit event structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Scheduler instance that owns the task.
    pub instance: String,
    /// Related task identifier.
    pub task_id: TaskId,
    /// Transition taken.
    pub action: AuditAction,
    /// Worker involved, when one is.
    pub worker_id: Option<usize>,
    /// Timestamp milliseconds.
    pub created_at_ms: u128,
    /// Additional context, such as a failure reason.
    pub detail: Option<String>,
}

/// Audit sink abstraction.
pub trait AuditSink: Send + Sync {
    /// Record an audit event. Called from worker and submitter threads; must not block for long.
    fn record(&self, event: AuditEvent);
}

/// In-memory audit sink for testing and dev. Clones share the same buffer.
#[derive(Clone)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<VecDeque<AuditEvent>>>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a new in-memory sink with a bounded buffer.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::with_capacity(max_events.min(1024)))),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Events recorded for one task, oldest first.
    #[must_use]
    pub fn events_for(&self, task_id: TaskId) -> Vec<AuditAction> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.task_id == task_id)
            .map(|e| e.action)
            .collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }
}

/// Sink that forwards events to `tracing` at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        tracing::debug!(
            instance = %event.instance,
            task_id = %event.task_id,
            action = ?event.action,
            worker_id = ?event.worker_id,
            detail = event.detail.as_deref().unwrap_or(""),
            "task audit event"
        );
    }
}

/// Helper to build an audit event stamped with the current time.
pub fn build_audit_event(
    instance: impl Into<String>,
    task_id: TaskId,
    action: AuditAction,
    worker_id: Option<usize>,
    detail: Option<String>,
) -> AuditEvent {
    AuditEvent {
        instance: instance.into(),
        task_id,
        action,
        worker_id,
        created_at_ms: now_ms(),
        detail,
    }
}
