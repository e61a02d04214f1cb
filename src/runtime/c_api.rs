//! C ABI for the process-wide registry.
//!
//! Every value crossing the boundary is an integer: handles and task ids are
//! `u64` (0 is the failure sentinel), results are `i32` status codes from
//! [`StatusCode`]. The code of the most recent failure on the calling thread
//! is available from [`pts_last_error`], its text from [`pts_last_error_message`].
//!
//! An outcome is held until it is awaited or forgotten. Fire-and-forget
//! callers release it with [`pts_task_forget`] right after submitting.
//!
//! Task callbacks are plain `extern "C" fn(u64) -> i32`; the `u64` is the
//! caller's `user_data` and a non-zero return marks the task failed. A
//! callback must not unwind.

#![allow(unsafe_code)]

use std::cell::{Cell, RefCell};
use std::time::Duration;

use tracing::debug;

use crate::config::DrainMode;
use crate::core::{
    CancelOutcome, Handle, Priority, SchedulerError, SchedulerStats, TaskError, TaskId, TaskOutcome,
};
use crate::runtime::api::{task_status_code, StatusCode};
use crate::runtime::global::registry;

/// Task callback signature.
pub type PtsTaskFn = extern "C" fn(u64) -> i32;

thread_local! {
    static LAST_ERROR: Cell<i32> = const { Cell::new(0) };
    static LAST_MESSAGE: RefCell<String> = const { RefCell::new(String::new()) };
}

fn set_last_error(code: StatusCode, message: Option<String>) {
    LAST_ERROR.with(|cell| cell.set(code.as_i32()));
    LAST_MESSAGE.with(|cell| {
        let mut last = cell.borrow_mut();
        last.clear();
        if let Some(message) = message {
            *last = message;
        }
    });
}

fn fail(op: &'static str, err: &SchedulerError) -> i32 {
    let code = err.code();
    debug!(op = op, error = %err, code = code.as_i32(), "C API call failed");
    set_last_error(code, Some(err.to_string()));
    code.as_i32()
}

fn succeed() -> i32 {
    set_last_error(StatusCode::Ok, None);
    StatusCode::Ok.as_i32()
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn millis(duration: Option<Duration>) -> i64 {
    duration.map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}

fn stat(op: &'static str, handle: u64, pick: fn(&SchedulerStats) -> u64) -> i64 {
    match registry().stats(Handle::from_raw(handle)) {
        Ok(stats) => {
            succeed();
            to_i64(pick(&stats))
        }
        Err(err) => i64::from(fail(op, &err)),
    }
}

/// Create a scheduler with `worker_count` workers.
///
/// Returns the handle, or 0 on failure (see [`pts_last_error`]).
#[no_mangle]
pub extern "C" fn pts_scheduler_create(worker_count: i64) -> u64 {
    let created = usize::try_from(worker_count)
        .map_err(|_| {
            SchedulerError::InvalidArgument(format!("worker count {worker_count} is negative"))
        })
        .and_then(|count| registry().create(count));
    match created {
        Ok(handle) => {
            succeed();
            handle.as_raw()
        }
        Err(err) => {
            fail("pts_scheduler_create", &err);
            Handle::NULL.as_raw()
        }
    }
}

/// Destroy a scheduler gracefully: queued tasks run, then workers are joined.
#[no_mangle]
pub extern "C" fn pts_scheduler_destroy(handle: u64) -> i32 {
    match registry().destroy_with(Handle::from_raw(handle), DrainMode::Graceful) {
        Ok(_) => succeed(),
        Err(err) => fail("pts_scheduler_destroy", &err),
    }
}

/// Destroy a scheduler, cancelling queued tasks and signalling running ones.
#[no_mangle]
pub extern "C" fn pts_scheduler_destroy_abort(handle: u64) -> i32 {
    match registry().destroy_with(Handle::from_raw(handle), DrainMode::Abort) {
        Ok(_) => succeed(),
        Err(err) => fail("pts_scheduler_destroy_abort", &err),
    }
}

/// Submit `callback(user_data)`. `priority` is clamped to 0..=3 and only used
/// by priority-ordered schedulers.
///
/// Returns the task id, or 0 on failure.
#[no_mangle]
pub extern "C" fn pts_scheduler_submit(
    handle: u64,
    callback: Option<PtsTaskFn>,
    user_data: u64,
    priority: i32,
) -> u64 {
    let Some(callback) = callback else {
        fail(
            "pts_scheduler_submit",
            &SchedulerError::InvalidArgument("callback is null".into()),
        );
        return 0;
    };
    let submitted = registry().submit_with_priority(
        Handle::from_raw(handle),
        Priority::from_i32(priority),
        move |_ctx| match callback(user_data) {
            0 => Ok(()),
            rc => Err(TaskError::failed(format!("callback returned {rc}"))),
        },
    );
    match submitted {
        Ok(task_id) => {
            succeed();
            task_id.0
        }
        Err(err) => {
            fail("pts_scheduler_submit", &err);
            0
        }
    }
}

/// Block until the task finishes and consume its outcome. `timeout_ms == 0`
/// waits forever.
///
/// Returns 0 if the task completed, `TaskFailure` or `Cancelled` for those
/// outcomes, or another negative code.
#[no_mangle]
pub extern "C" fn pts_task_await(handle: u64, task_id: u64, timeout_ms: u64) -> i32 {
    let handle = Handle::from_raw(handle);
    let task_id = TaskId(task_id);
    let waited = if timeout_ms == 0 {
        registry().wait(handle, task_id)
    } else {
        registry().wait_timeout(handle, task_id, Duration::from_millis(timeout_ms))
    };
    match waited {
        Ok(TaskOutcome::Completed(())) => succeed(),
        Ok(TaskOutcome::Failed(err)) => fail("pts_task_await", &SchedulerError::from(err)),
        Ok(TaskOutcome::Cancelled) => fail("pts_task_await", &SchedulerError::Cancelled),
        Err(err) => fail("pts_task_await", &err),
    }
}

/// Cancel a task.
///
/// Returns 0 if it was dequeued before running, 1 if it is running and was
/// signalled, 2 if it had already finished, or a negative code.
#[no_mangle]
pub extern "C" fn pts_task_cancel(handle: u64, task_id: u64) -> i32 {
    match registry().cancel(Handle::from_raw(handle), TaskId(task_id)) {
        Ok(outcome) => {
            succeed();
            match outcome {
                CancelOutcome::Dequeued => 0,
                CancelOutcome::Signalled => 1,
                CancelOutcome::AlreadyFinished => 2,
            }
        }
        Err(err) => fail("pts_task_cancel", &err),
    }
}

/// Status of a task whose outcome has not been consumed: 0 queued, 1 running,
/// 2 completed, 3 failed, 4 cancelled, or a negative code.
#[no_mangle]
pub extern "C" fn pts_task_status(handle: u64, task_id: u64) -> i32 {
    match registry().status(Handle::from_raw(handle), TaskId(task_id)) {
        Ok(status) => {
            succeed();
            task_status_code(status)
        }
        Err(err) => fail("pts_task_status", &err),
    }
}

/// Release a task's held outcome without waiting. The task itself still runs.
///
/// Returns 0 if an outcome was released, `TaskNotFound` if none was held, or
/// another negative code.
#[no_mangle]
pub extern "C" fn pts_task_forget(handle: u64, task_id: u64) -> i32 {
    let task_id = TaskId(task_id);
    match registry().forget(Handle::from_raw(handle), task_id) {
        Ok(true) => succeed(),
        Ok(false) => fail("pts_task_forget", &SchedulerError::TaskNotFound(task_id)),
        Err(err) => fail("pts_task_forget", &err),
    }
}

/// Milliseconds the task spent queued, or running so far once started. 0 while
/// not yet known; negative codes as usual.
#[no_mangle]
pub extern "C" fn pts_task_queue_wait_ms(handle: u64, task_id: u64) -> i64 {
    match registry().report(Handle::from_raw(handle), TaskId(task_id)) {
        Ok(report) => {
            succeed();
            millis(report.queue_wait)
        }
        Err(err) => i64::from(fail("pts_task_queue_wait_ms", &err)),
    }
}

/// Milliseconds the task has been running, or ran for once finished. 0 if it
/// never started; negative codes as usual.
#[no_mangle]
pub extern "C" fn pts_task_run_time_ms(handle: u64, task_id: u64) -> i64 {
    match registry().report(Handle::from_raw(handle), TaskId(task_id)) {
        Ok(report) => {
            succeed();
            millis(report.run_time)
        }
        Err(err) => i64::from(fail("pts_task_run_time_ms", &err)),
    }
}

/// Scheduler lifecycle state: 0 starting, 1 running, 2 draining, 3 stopped,
/// or a negative code.
#[no_mangle]
pub extern "C" fn pts_scheduler_state(handle: u64) -> i32 {
    match registry().resolve(Handle::from_raw(handle)) {
        Ok(scheduler) => {
            succeed();
            scheduler.state() as i32
        }
        Err(err) => fail("pts_scheduler_state", &err),
    }
}

/// Tasks waiting in the queue, or a negative code.
#[no_mangle]
pub extern "C" fn pts_scheduler_queued_tasks(handle: u64) -> i64 {
    stat("pts_scheduler_queued_tasks", handle, |s| s.queued_tasks)
}

/// Tasks currently executing, or a negative code.
#[no_mangle]
pub extern "C" fn pts_scheduler_active_tasks(handle: u64) -> i64 {
    stat("pts_scheduler_active_tasks", handle, |s| s.active_tasks)
}

/// Tasks that completed successfully, or a negative code.
#[no_mangle]
pub extern "C" fn pts_scheduler_completed_tasks(handle: u64) -> i64 {
    stat("pts_scheduler_completed_tasks", handle, |s| s.completed_tasks)
}

/// Tasks that failed or panicked, or a negative code.
#[no_mangle]
pub extern "C" fn pts_scheduler_failed_tasks(handle: u64) -> i64 {
    stat("pts_scheduler_failed_tasks", handle, |s| s.failed_tasks)
}

/// Tasks cancelled queued or running, or a negative code.
#[no_mangle]
pub extern "C" fn pts_scheduler_cancelled_tasks(handle: u64) -> i64 {
    stat("pts_scheduler_cancelled_tasks", handle, |s| s.cancelled_tasks)
}

/// Outcomes held for tasks not yet awaited or forgotten, or a negative code.
#[no_mangle]
pub extern "C" fn pts_scheduler_retained_results(handle: u64) -> i64 {
    match registry().resolve(Handle::from_raw(handle)) {
        Ok(scheduler) => {
            succeed();
            i64::try_from(scheduler.retained_results()).unwrap_or(i64::MAX)
        }
        Err(err) => i64::from(fail("pts_scheduler_retained_results", &err)),
    }
}

/// Configured worker count, or a negative code.
#[no_mangle]
pub extern "C" fn pts_scheduler_worker_count(handle: u64) -> i64 {
    match registry().resolve(Handle::from_raw(handle)) {
        Ok(scheduler) => {
            succeed();
            i64::try_from(scheduler.worker_count()).unwrap_or(i64::MAX)
        }
        Err(err) => i64::from(fail("pts_scheduler_worker_count", &err)),
    }
}

/// Code of the last failure on this thread, or 0 if the last call succeeded.
#[no_mangle]
pub extern "C" fn pts_last_error() -> i32 {
    LAST_ERROR.with(Cell::get)
}

/// Copy the message of the last failure on this thread into `buf` as a
/// NUL-terminated UTF-8 string, truncated to `len - 1` bytes.
///
/// Returns the full message length in bytes, excluding the terminator; 0 if
/// the last call succeeded. Pass a null `buf` to query the length.
///
/// # Safety
/// - `buf` must be null or valid for writes of `len` bytes
#[no_mangle]
pub unsafe extern "C" fn pts_last_error_message(buf: *mut u8, len: usize) -> usize {
    LAST_MESSAGE.with(|cell| {
        let message = cell.borrow();
        let bytes = message.as_bytes();
        if !buf.is_null() && len > 0 {
            let copied = bytes.len().min(len - 1);
            // SAFETY: caller guarantees `buf` is writable for `len` bytes and copied < len
            unsafe {
                std::ptr::copy_nonoverlapping(bytes.as_ptr(), buf, copied);
                *buf.add(copied) = 0;
            }
        }
        bytes.len()
    })
}
