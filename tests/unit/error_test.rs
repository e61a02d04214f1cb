//! Tests for error types

use prometheus_task_scheduler::core::{SchedulerError, TaskError, TaskId};
use prometheus_task_scheduler::runtime::StatusCode;

#[test]
fn test_invalid_argument_error() {
    let err = SchedulerError::InvalidArgument("worker count must be greater than 0".to_string());
    assert_eq!(
        format!("{}", err),
        "invalid argument: worker count must be greater than 0"
    );
    assert_eq!(err.code(), StatusCode::InvalidArgument);
}

#[test]
fn test_invalid_handle_error() {
    let err = SchedulerError::InvalidHandle;
    assert_eq!(format!("{}", err), "invalid handle");
    assert_eq!(err.code().as_i32(), -2);
}

#[test]
fn test_scheduler_stopping_error() {
    let err = SchedulerError::SchedulerStopping;
    assert_eq!(format!("{}", err), "scheduler is stopping");
}

#[test]
fn test_task_not_found_error() {
    let err = SchedulerError::TaskNotFound(TaskId(12));
    assert_eq!(format!("{}", err), "task 12 not found");
    assert_eq!(err.code(), StatusCode::TaskNotFound);
}

#[test]
fn test_task_error_display() {
    assert_eq!(format!("{}", TaskError::failed("bad input")), "bad input");
    assert_eq!(
        format!("{}", TaskError::Panicked("index out of bounds".into())),
        "panicked: index out of bounds"
    );
}

#[test]
fn test_anyhow_interop() {
    fn app_step() -> prometheus_task_scheduler::core::AppResult<()> {
        Err(SchedulerError::QueueFull.into())
    }
    let err = app_step().unwrap_err();
    assert_eq!(err.downcast_ref::<SchedulerError>(), Some(&SchedulerError::QueueFull));
}
