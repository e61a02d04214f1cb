//! Task identity, priority, status, and outcome types.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::error::{SchedulerError, TaskError};

/// Identifier of a submitted task, unique within one scheduler.
///
/// Ids start at 1; `0` is never issued so foreign callers can use it as a
/// failure sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Task priority. Only consulted when the queue runs in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Background work.
    Low,
    /// Default priority.
    #[default]
    Normal,
    /// Served before normal work.
    High,
    /// Served first.
    Critical,
}

impl Priority {
    /// Map a foreign integer onto a priority, clamping out-of-range values.
    #[must_use]
    pub const fn from_i32(value: i32) -> Self {
        match value {
            i32::MIN..=0 => Self::Low,
            1 => Self::Normal,
            2 => Self::High,
            _ => Self::Critical,
        }
    }
}

/// Status of a task in the scheduler lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting in the queue.
    Queued,
    /// Owned by a worker and executing.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error or panic.
    Failed,
    /// Cancelled before or during execution.
    Cancelled,
}

impl TaskStatus {
    /// Whether the task has reached a final state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Final result of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome<R> {
    /// The task returned a value.
    Completed(R),
    /// The task returned an error or panicked.
    Failed(TaskError),
    /// The task was cancelled.
    Cancelled,
}

impl<R> TaskOutcome<R> {
    /// Status matching this outcome.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        match self {
            Self::Completed(_) => TaskStatus::Completed,
            Self::Failed(_) => TaskStatus::Failed,
            Self::Cancelled => TaskStatus::Cancelled,
        }
    }

    /// Collapse the outcome into a `Result`, mapping task faults onto
    /// [`SchedulerError::TaskFailure`] and cancellation onto
    /// [`SchedulerError::Cancelled`].
    ///
    /// # Errors
    ///
    /// Returns an error for failed and cancelled outcomes.
    pub fn into_result(self) -> Result<R, SchedulerError> {
        match self {
            Self::Completed(value) => Ok(value),
            Self::Failed(err) => Err(err.into()),
            Self::Cancelled => Err(SchedulerError::Cancelled),
        }
    }
}

/// Result of a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelOutcome {
    /// The task was still queued and will never run.
    Dequeued,
    /// The task is running; its context now reports cancellation.
    Signalled,
    /// The task had already finished.
    AlreadyFinished,
}

/// Cooperative cancellation flag shared between a task and its scheduler.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create an un-cancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Execution context handed to a task body.
#[derive(Debug, Clone)]
pub struct TaskContext {
    task_id: TaskId,
    worker_id: usize,
    token: CancellationToken,
}

impl TaskContext {
    pub(crate) const fn new(task_id: TaskId, worker_id: usize, token: CancellationToken) -> Self {
        Self {
            task_id,
            worker_id,
            token,
        }
    }

    /// Id of the running task.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Id of the worker executing the task.
    #[must_use]
    pub const fn worker_id(&self) -> usize {
        self.worker_id
    }

    /// Whether the scheduler asked this task to stop. Long-running tasks should
    /// check this periodically; it is the only way they can be aborted.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Timing and placement of a task, available until its outcome is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskReport {
    /// Task identifier.
    pub task_id: TaskId,
    /// Current status.
    pub status: TaskStatus,
    /// Worker that picked the task up, if any.
    pub worker_id: Option<usize>,
    /// Time spent queued before a worker took it.
    pub queue_wait: Option<Duration>,
    /// Time spent executing.
    pub run_time: Option<Duration>,
}

/// Boxed task body.
pub(crate) type TaskBody<R> =
    Box<dyn FnOnce(&TaskContext) -> Result<R, TaskError> + Send + 'static>;
