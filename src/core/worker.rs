//! Worker threads and the per-task dispatch loop.
//!
//! Each worker blocks in [`TaskQueue::dequeue_blocking`] (the only place it
//! parks), runs the task it receives to completion, records the outcome in the
//! task's slot, and loops. A panicking task is caught with `catch_unwind` and
//! recorded as that task's failure; it never unwinds past the loop.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Instant;

use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::audit::{build_audit_event, AuditAction, AuditSink};
use crate::core::error::TaskError;
use crate::core::queue::{Dequeued, TaskQueue};
use crate::core::results::{ResultStorage, TaskSlot};
use crate::core::stats::SchedulerCounters;
use crate::core::task::{TaskBody, TaskContext, TaskId, TaskOutcome, TaskStatus};

/// Observable state of one worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum WorkerState {
    /// Waiting for work.
    Idle = 0,
    /// Executing a task.
    Running = 1,
    /// Exited its loop.
    Stopped = 2,
}

impl WorkerState {
    pub(crate) const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Running,
            _ => Self::Stopped,
        }
    }
}

/// A queued unit of work: its completion slot plus the body to run.
pub(crate) struct Job<R> {
    pub slot: Arc<TaskSlot<R>>,
    pub body: TaskBody<R>,
}

/// State shared between a scheduler and its workers.
pub(crate) struct Shared<R> {
    pub queue: TaskQueue<Job<R>>,
    pub results: ResultStorage<R>,
    pub counters: SchedulerCounters,
    pub audit: Option<Arc<dyn AuditSink>>,
    pub instance: String,
}

impl<R> Shared<R> {
    pub fn audit(
        &self,
        task_id: TaskId,
        action: AuditAction,
        worker_id: Option<usize>,
        detail: Option<String>,
    ) {
        if let Some(sink) = &self.audit {
            let instance = self.instance.clone();
            sink.record(build_audit_event(instance, task_id, action, worker_id, detail));
        }
    }

    /// Count and audit a terminal transition that was just recorded in a slot.
    pub fn note_finished(
        &self,
        task_id: TaskId,
        status: TaskStatus,
        worker_id: Option<usize>,
        detail: Option<String>,
    ) {
        let (counter, action) = match status {
            TaskStatus::Completed => (&self.counters.completed_tasks, AuditAction::Succeeded),
            TaskStatus::Failed => (&self.counters.failed_tasks, AuditAction::Failed),
            TaskStatus::Queued | TaskStatus::Running | TaskStatus::Cancelled => {
                (&self.counters.cancelled_tasks, AuditAction::Cancelled)
            }
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.audit(task_id, action, worker_id, detail);
    }

    /// Execute one job on behalf of `worker_id`.
    fn run_job(&self, worker_id: usize, job: Job<R>) {
        let Job { slot, body } = job;
        let task_id = slot.id();

        if !slot.begin(worker_id) {
            debug!(
                worker_id = worker_id,
                task_id = %task_id,
                "Skipping task cancelled while queued"
            );
            return;
        }

        self.counters.active_tasks.fetch_add(1, Ordering::Relaxed);
        self.audit(task_id, AuditAction::Started, Some(worker_id), None);
        debug!(worker_id = worker_id, task_id = %task_id, "Worker executing task");

        let token = slot.token();
        let ctx = TaskContext::new(task_id, worker_id, token.clone());
        let started = Instant::now();
        let result = catch_unwind(AssertUnwindSafe(move || body(&ctx)));
        self.counters.record_run_time(started.elapsed());

        let outcome = if token.is_cancelled() {
            TaskOutcome::Cancelled
        } else {
            match result {
                Ok(Ok(value)) => TaskOutcome::Completed(value),
                Ok(Err(err)) => TaskOutcome::Failed(err),
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    self.counters.panicked_tasks.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        worker_id = worker_id,
                        task_id = %task_id,
                        panic = %message,
                        "Task panicked"
                    );
                    TaskOutcome::Failed(TaskError::Panicked(message))
                }
            }
        };

        let status = outcome.status();
        let detail = match &outcome {
            TaskOutcome::Failed(err) => Some(err.to_string()),
            _ => None,
        };
        if slot.finish(outcome) {
            self.note_finished(task_id, status, Some(worker_id), detail);
        }

        self.counters.active_tasks.fetch_sub(1, Ordering::Relaxed);
        self.audit(task_id, AuditAction::Finished, Some(worker_id), None);
        debug!(
            worker_id = worker_id,
            task_id = %task_id,
            status = ?status,
            "Worker completed task"
        );
    }
}

/// Extract a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Scheduler-side handle to a spawned worker.
pub(crate) struct WorkerHandle {
    pub id: usize,
    pub thread_id: ThreadId,
    pub join: JoinHandle<()>,
}

/// Marks the worker stopped and reports its exit, even if the loop unwinds.
struct ExitSignal {
    worker_id: usize,
    state: Arc<AtomicU8>,
    exit_tx: Sender<usize>,
}

impl Drop for ExitSignal {
    fn drop(&mut self) {
        self.state.store(WorkerState::Stopped as u8, Ordering::Release);
        let _ = self.exit_tx.send(self.worker_id);
        debug!(worker_id = self.worker_id, "Worker thread exiting");
    }
}

/// Settings for spawning one worker thread.
pub(crate) struct WorkerSpawn {
    pub worker_id: usize,
    pub name: String,
    pub stack_size: Option<usize>,
    pub state: Arc<AtomicU8>,
    pub ready_tx: Sender<usize>,
    pub exit_tx: Sender<usize>,
}

/// Spawn a worker thread that serves `shared.queue` until it is closed and empty.
///
/// # Errors
///
/// Returns the OS error if the thread could not be created.
pub(crate) fn spawn_worker<R>(
    spawn: WorkerSpawn,
    shared: Arc<Shared<R>>,
) -> std::io::Result<WorkerHandle>
where
    R: Send + 'static,
{
    let WorkerSpawn {
        worker_id,
        name,
        stack_size,
        state,
        ready_tx,
        exit_tx,
    } = spawn;

    let mut builder = thread::Builder::new().name(name);
    if let Some(size) = stack_size {
        builder = builder.stack_size(size);
    }

    let join = builder.spawn(move || {
        let _exit = ExitSignal {
            worker_id,
            state: Arc::clone(&state),
            exit_tx,
        };
        debug!(worker_id = worker_id, "Worker thread started");
        let _ = ready_tx.send(worker_id);
        drop(ready_tx);

        // Blocking dequeue, NO POLLING; Closed means drained and shutting down
        while let Dequeued::Task(job) = shared.queue.dequeue_blocking() {
            shared.counters.queued_tasks.fetch_sub(1, Ordering::Relaxed);
            state.store(WorkerState::Running as u8, Ordering::Release);
            shared.run_job(worker_id, job);
            state.store(WorkerState::Idle as u8, Ordering::Release);
        }
        debug!(worker_id = worker_id, "Worker queue closed, exiting");
    })?;

    Ok(WorkerHandle {
        id: worker_id,
        thread_id: join.thread().id(),
        join,
    })
}
