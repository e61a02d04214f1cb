//! Core scheduling abstractions: tasks, queue, workers, scheduler, and handle registry.

pub mod audit;
pub mod error;
pub mod queue;
pub mod registry;
pub(crate) mod results;
pub mod scheduler;
pub mod stats;
pub mod task;
pub mod worker;

pub use audit::{
    build_audit_event, AuditAction, AuditEvent, AuditSink, InMemoryAuditSink, TracingAuditSink,
};
pub use error::{AppResult, SchedulerError, TaskError};
pub use queue::{Dequeued, TaskQueue};
pub use registry::{Handle, HandleRegistry};
pub use scheduler::{Scheduler, SchedulerState, ShutdownReport};
pub use stats::SchedulerStats;
pub use task::{
    CancelOutcome, CancellationToken, Priority, TaskContext, TaskId, TaskOutcome, TaskReport,
    TaskStatus,
};
pub use worker::WorkerState;
