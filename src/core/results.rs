//! Per-task completion slots with Condvar-based waiting.
//!
//! Design:
//! - `RwLock` for the slot map (read-heavy, write on submit/consume)
//! - Per-slot `Mutex` + `Condvar` so waiters park without polling
//! - A slot moves to a terminal status exactly once; later writers are ignored

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, RwLock};

use crate::core::error::SchedulerError;
use crate::core::task::{
    CancelOutcome, CancellationToken, TaskId, TaskOutcome, TaskReport, TaskStatus,
};

struct SlotState<R> {
    status: TaskStatus,
    outcome: Option<TaskOutcome<R>>,
    worker_id: Option<usize>,
    queued_at: Instant,
    started_at: Option<Instant>,
    finished_at: Option<Instant>,
}

/// Completion slot for one task.
pub(crate) struct TaskSlot<R> {
    id: TaskId,
    state: Mutex<SlotState<R>>,
    finished: Condvar,
    token: CancellationToken,
}

impl<R> TaskSlot<R> {
    pub(crate) fn new(id: TaskId) -> Self {
        Self {
            id,
            state: Mutex::new(SlotState {
                status: TaskStatus::Queued,
                outcome: None,
                worker_id: None,
                queued_at: Instant::now(),
                started_at: None,
                finished_at: None,
            }),
            finished: Condvar::new(),
            token: CancellationToken::new(),
        }
    }

    pub(crate) const fn id(&self) -> TaskId {
        self.id
    }

    pub(crate) fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub(crate) fn status(&self) -> TaskStatus {
        self.state.lock().status
    }

    /// Claim the task for a worker. Fails if it was cancelled while queued.
    pub(crate) fn begin(&self, worker_id: usize) -> bool {
        let mut state = self.state.lock();
        if state.status != TaskStatus::Queued {
            return false;
        }
        state.status = TaskStatus::Running;
        state.worker_id = Some(worker_id);
        state.started_at = Some(Instant::now());
        true
    }

    /// Record the final outcome and wake waiters. Returns `false` if the slot
    /// already held one.
    pub(crate) fn finish(&self, outcome: TaskOutcome<R>) -> bool {
        let mut state = self.state.lock();
        if state.status.is_terminal() {
            return false;
        }
        state.status = outcome.status();
        state.outcome = Some(outcome);
        state.finished_at = Some(Instant::now());
        drop(state);
        self.finished.notify_all();
        true
    }

    /// Cancel a task that has not started yet.
    pub(crate) fn cancel_pending(&self) -> bool {
        let mut state = self.state.lock();
        if state.status != TaskStatus::Queued {
            return false;
        }
        self.token.cancel();
        state.status = TaskStatus::Cancelled;
        state.outcome = Some(TaskOutcome::Cancelled);
        state.finished_at = Some(Instant::now());
        drop(state);
        self.finished.notify_all();
        true
    }

    fn cancel(&self) -> CancelOutcome {
        let status = self.state.lock().status;
        match status {
            TaskStatus::Queued if self.cancel_pending() => CancelOutcome::Dequeued,
            TaskStatus::Queued | TaskStatus::Running => {
                // Lost a race with a worker claiming it, or already running
                self.token.cancel();
                if self.status().is_terminal() {
                    CancelOutcome::AlreadyFinished
                } else {
                    CancelOutcome::Signalled
                }
            }
            _ => CancelOutcome::AlreadyFinished,
        }
    }

    fn report(&self) -> TaskReport {
        let state = self.state.lock();
        let queue_wait = state
            .started_at
            .or(state.finished_at)
            .map(|t| t.saturating_duration_since(state.queued_at));
        let run_time = match (state.started_at, state.finished_at) {
            (Some(start), Some(end)) => Some(end.saturating_duration_since(start)),
            (Some(start), None) => Some(start.elapsed()),
            _ => None,
        };
        TaskReport {
            task_id: self.id,
            status: state.status,
            worker_id: state.worker_id,
            queue_wait,
            run_time,
        }
    }

    /// Block until terminal, or until `deadline`.
    fn wait_until(&self, deadline: Option<Instant>) -> Result<TaskOutcome<R>, SchedulerError> {
        let mut state = self.state.lock();
        while !state.status.is_terminal() {
            match deadline {
                Some(deadline) => {
                    if self.finished.wait_until(&mut state, deadline).timed_out()
                        && !state.status.is_terminal()
                    {
                        return Err(SchedulerError::Timeout);
                    }
                }
                None => self.finished.wait(&mut state),
            }
        }
        state.outcome.take().ok_or(SchedulerError::TaskNotFound(self.id))
    }
}

/// Completion slots for every task whose outcome has not been consumed.
pub(crate) struct ResultStorage<R> {
    entries: RwLock<HashMap<TaskId, Arc<TaskSlot<R>>>>,
}

impl<R> ResultStorage<R> {
    pub(crate) fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) fn insert(&self, slot: Arc<TaskSlot<R>>) {
        self.entries.write().insert(slot.id(), slot);
    }

    pub(crate) fn get(&self, id: TaskId) -> Option<Arc<TaskSlot<R>>> {
        self.entries.read().get(&id).cloned()
    }

    pub(crate) fn remove(&self, id: TaskId) -> bool {
        self.entries.write().remove(&id).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Wait for a task's outcome and consume it.
    ///
    /// A timed-out wait leaves the slot in place so the caller can retry.
    pub(crate) fn wait(
        &self,
        id: TaskId,
        timeout: Option<Duration>,
    ) -> Result<TaskOutcome<R>, SchedulerError> {
        let slot = self.get(id).ok_or(SchedulerError::TaskNotFound(id))?;
        let deadline = timeout.map(|t| Instant::now() + t);
        let outcome = slot.wait_until(deadline)?;
        self.remove(id);
        Ok(outcome)
    }

    pub(crate) fn cancel(&self, id: TaskId) -> Result<CancelOutcome, SchedulerError> {
        let slot = self.get(id).ok_or(SchedulerError::TaskNotFound(id))?;
        Ok(slot.cancel())
    }

    pub(crate) fn status(&self, id: TaskId) -> Result<TaskStatus, SchedulerError> {
        self.get(id)
            .map(|slot| slot.status())
            .ok_or(SchedulerError::TaskNotFound(id))
    }

    pub(crate) fn report(&self, id: TaskId) -> Result<TaskReport, SchedulerError> {
        self.get(id)
            .map(|slot| slot.report())
            .ok_or(SchedulerError::TaskNotFound(id))
    }

    /// Slots of tasks currently owned by a worker.
    pub(crate) fn running(&self) -> Vec<Arc<TaskSlot<R>>> {
        self.matching(|status| status == TaskStatus::Running)
    }

    /// Slots without a terminal status. Includes tasks a worker has dequeued
    /// but not yet claimed with [`TaskSlot::begin`].
    pub(crate) fn unfinished(&self) -> Vec<Arc<TaskSlot<R>>> {
        self.matching(|status| !status.is_terminal())
    }

    fn matching(&self, keep: impl Fn(TaskStatus) -> bool) -> Vec<Arc<TaskSlot<R>>> {
        self.entries
            .read()
            .values()
            .filter(|slot| keep(slot.status()))
            .cloned()
            .collect()
    }
}
