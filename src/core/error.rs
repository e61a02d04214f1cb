//! Error types for scheduler operations.

use thiserror::Error;

use crate::core::task::TaskId;

/// Errors produced by scheduler lifecycle and submission operations.
///
/// Failures that belong to a single task are carried by [`TaskError`] inside the
/// task's outcome and only surface here as [`SchedulerError::TaskFailure`] when a
/// caller asks for the outcome as a plain `Result`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// Bad worker count, configuration value, or task payload.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The handle was never issued or has already been destroyed.
    #[error("invalid handle")]
    InvalidHandle,
    /// The queue has been closed and accepts no further work.
    #[error("queue closed")]
    QueueClosed,
    /// A bounded queue is at its configured depth.
    #[error("queue full")]
    QueueFull,
    /// Submission attempted after the scheduler started draining.
    #[error("scheduler is stopping")]
    SchedulerStopping,
    /// The task ran and failed; the message describes the fault.
    #[error("task failed: {0}")]
    TaskFailure(String),
    /// The task was cancelled before it could complete.
    #[error("task cancelled")]
    Cancelled,
    /// Threads or registry slots could not be allocated.
    #[error("allocation failure: {0}")]
    AllocationFailure(String),
    /// A wait ran past its deadline.
    #[error("operation timed out")]
    Timeout,
    /// No outcome is held for this task (unknown id, or already consumed).
    #[error("task {0} not found")]
    TaskNotFound(TaskId),
    /// The process-wide default scheduler already exists.
    #[error("default scheduler already initialized")]
    AlreadyInitialized,
    /// The process-wide default scheduler has not been created.
    #[error("default scheduler not initialized")]
    NotInitialized,
    /// Internal error (runtime bridge failure, worker lost, etc.).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Failure of a single task, recorded as that task's outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The task body returned an error.
    #[error("{0}")]
    Failed(String),
    /// The task body panicked; the panic was caught by its worker.
    #[error("panicked: {0}")]
    Panicked(String),
}

impl TaskError {
    /// Build a [`TaskError::Failed`] from any displayable reason.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }
}

impl From<TaskError> for SchedulerError {
    fn from(err: TaskError) -> Self {
        Self::TaskFailure(err.to_string())
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
