//! API-facing status codes and request/response models.

use serde::{Deserialize, Serialize};

use crate::core::{
    Handle, Scheduler, SchedulerError, SchedulerState, SchedulerStats, TaskId, TaskReport,
    TaskStatus, WorkerState,
};

/// Numeric result codes shared by the C ABI and any other foreign surface.
///
/// `Ok` is zero; every failure is negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum StatusCode {
    /// Success.
    Ok = 0,
    /// Bad worker count, configuration, or callback.
    InvalidArgument = -1,
    /// Unknown or destroyed handle.
    InvalidHandle = -2,
    /// Queue closed.
    QueueClosed = -3,
    /// Scheduler is draining or stopped.
    SchedulerStopping = -4,
    /// Task ran and failed.
    TaskFailure = -5,
    /// Threads or slots could not be allocated.
    AllocationFailure = -6,
    /// Wait deadline passed.
    Timeout = -7,
    /// Unknown or already-consumed task.
    TaskNotFound = -8,
    /// Task was cancelled.
    Cancelled = -9,
    /// Bounded queue at capacity.
    QueueFull = -10,
    /// Default scheduler already exists.
    AlreadyInitialized = -11,
    /// Default scheduler missing.
    NotInitialized = -12,
    /// Internal failure.
    Internal = -13,
}

impl StatusCode {
    /// Raw integer value.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }
}

impl From<&SchedulerError> for StatusCode {
    fn from(err: &SchedulerError) -> Self {
        match err {
            SchedulerError::InvalidArgument(_) => Self::InvalidArgument,
            SchedulerError::InvalidHandle => Self::InvalidHandle,
            SchedulerError::QueueClosed => Self::QueueClosed,
            SchedulerError::QueueFull => Self::QueueFull,
            SchedulerError::SchedulerStopping => Self::SchedulerStopping,
            SchedulerError::TaskFailure(_) => Self::TaskFailure,
            SchedulerError::Cancelled => Self::Cancelled,
            SchedulerError::AllocationFailure(_) => Self::AllocationFailure,
            SchedulerError::Timeout => Self::Timeout,
            SchedulerError::TaskNotFound(_) => Self::TaskNotFound,
            SchedulerError::AlreadyInitialized => Self::AlreadyInitialized,
            SchedulerError::NotInitialized => Self::NotInitialized,
            SchedulerError::Internal(_) => Self::Internal,
        }
    }
}

impl SchedulerError {
    /// Numeric code for this error.
    #[must_use]
    pub fn code(&self) -> StatusCode {
        StatusCode::from(self)
    }
}

/// Integer encoding of [`TaskStatus`] for foreign callers (non-negative, so it
/// never collides with a [`StatusCode`] failure).
#[must_use]
pub const fn task_status_code(status: TaskStatus) -> i32 {
    match status {
        TaskStatus::Queued => 0,
        TaskStatus::Running => 1,
        TaskStatus::Completed => 2,
        TaskStatus::Failed => 3,
        TaskStatus::Cancelled => 4,
    }
}

/// Task status response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatusResponse {
    /// Task identifier.
    pub task_id: TaskId,
    /// Current status.
    pub status: TaskStatus,
    /// Worker that picked the task up.
    pub worker_id: Option<usize>,
    /// Milliseconds spent queued.
    pub queue_wait_ms: Option<u64>,
    /// Milliseconds spent executing.
    pub run_time_ms: Option<u64>,
}

impl From<TaskReport> for TaskStatusResponse {
    fn from(report: TaskReport) -> Self {
        let millis = |d: std::time::Duration| u64::try_from(d.as_millis()).unwrap_or(u64::MAX);
        Self {
            task_id: report.task_id,
            status: report.status,
            worker_id: report.worker_id,
            queue_wait_ms: report.queue_wait.map(millis),
            run_time_ms: report.run_time.map(millis),
        }
    }
}

/// Scheduler snapshot data for listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerSnapshot {
    /// Handle the scheduler is registered under.
    pub handle: Handle,
    /// Instance id used in logs and audit events.
    pub instance_id: String,
    /// Lifecycle state.
    pub state: SchedulerState,
    /// Per-worker state.
    pub workers: Vec<WorkerState>,
    /// Counters at capture time.
    pub stats: SchedulerStats,
}

impl SchedulerSnapshot {
    /// Capture the current state of `scheduler`.
    #[must_use]
    pub fn capture<R>(handle: Handle, scheduler: &Scheduler<R>) -> Self
    where
        R: Send + 'static,
    {
        Self {
            handle,
            instance_id: scheduler.instance_id().to_string(),
            state: scheduler.state(),
            workers: scheduler.worker_states(),
            stats: scheduler.stats(),
        }
    }
}
