//! Scheduler: owns the queue, the workers, and the lifecycle state machine.
//!
//! ```text
//! Starting --(all workers ready)--> Running --(shutdown)--> Draining --(workers joined)--> Stopped
//! ```
//!
//! `submit` is accepted in `Starting` and `Running`. `shutdown` closes the queue,
//! then either lets workers drain it (`DrainMode::Graceful`) or cancels pending
//! work and signals running work (`DrainMode::Abort`), and returns once every
//! worker has been joined or, on abort, detached after its timeout.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{DrainMode, SchedulerConfig};
use crate::core::audit::{AuditAction, AuditSink};
use crate::core::error::{SchedulerError, TaskError};
use crate::core::queue::TaskQueue;
use crate::core::results::{ResultStorage, TaskSlot};
use crate::core::stats::{SchedulerCounters, SchedulerStats};
use crate::core::task::{
    CancelOutcome, Priority, TaskContext, TaskId, TaskOutcome, TaskReport, TaskStatus,
};
use crate::core::worker::{spawn_worker, Job, Shared, WorkerHandle, WorkerSpawn, WorkerState};

/// Lifecycle state of a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum SchedulerState {
    /// Workers are being spawned.
    Starting = 0,
    /// Steady state.
    Running = 1,
    /// Queue closed; outstanding work is being resolved.
    Draining = 2,
    /// Terminal; all workers have exited.
    Stopped = 3,
}

impl SchedulerState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Starting,
            1 => Self::Running,
            2 => Self::Draining,
            _ => Self::Stopped,
        }
    }

    /// Whether `submit` is accepted in this state.
    #[must_use]
    pub const fn accepts_work(self) -> bool {
        matches!(self, Self::Starting | Self::Running)
    }
}

/// Summary of a completed shutdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownReport {
    /// Drain mode that was applied.
    pub mode: DrainMode,
    /// Workers that exited and were joined.
    pub joined_workers: usize,
    /// Workers still stuck in a task when the abort timeout expired.
    pub detached_workers: usize,
    /// Tasks cancelled by this shutdown.
    pub cancelled_tasks: u64,
    /// Statistics at the moment the scheduler stopped.
    pub stats: SchedulerStats,
}

/// Fixed-size worker pool with a FIFO (or priority) task queue.
///
/// `R` is the value produced by successful tasks. Results do not need to be
/// serializable; channels and handles are fine.
pub struct Scheduler<R>
where
    R: Send + 'static,
{
    config: SchedulerConfig,
    shared: Arc<Shared<R>>,
    state: AtomicU8,
    workers: Mutex<Vec<WorkerHandle>>,
    worker_threads: Mutex<Vec<ThreadId>>,
    worker_states: Vec<Arc<AtomicU8>>,
    exit_rx: Receiver<usize>,
    next_task_id: AtomicU64,
    instance_id: Uuid,
}

impl<R> Scheduler<R>
where
    R: Send + 'static,
{
    /// Spawn `config.worker_count` workers and wait until every one reports ready.
    ///
    /// # Errors
    ///
    /// - `SchedulerError::InvalidArgument` if the configuration is invalid
    /// - `SchedulerError::AllocationFailure` if a thread cannot be spawned or the
    ///   workers do not become ready within `startup_timeout_ms`; workers that
    ///   did start are shut down before returning
    pub fn start(
        config: SchedulerConfig,
        audit: Option<Arc<dyn AuditSink>>,
    ) -> Result<Self, SchedulerError> {
        config.validate().map_err(SchedulerError::InvalidArgument)?;

        let worker_count = config.worker_count;
        let instance_id = Uuid::new_v4();
        let shared = Arc::new(Shared {
            queue: TaskQueue::new(config.queue_order, config.max_queue_depth),
            results: ResultStorage::new(),
            counters: SchedulerCounters::default(),
            audit,
            instance: instance_id.to_string(),
        });
        let (ready_tx, ready_rx) = bounded::<usize>(worker_count);
        let (exit_tx, exit_rx) = bounded::<usize>(worker_count);
        let worker_states: Vec<Arc<AtomicU8>> = (0..worker_count)
            .map(|_| Arc::new(AtomicU8::new(WorkerState::Idle as u8)))
            .collect();

        let scheduler = Self {
            shared,
            state: AtomicU8::new(SchedulerState::Starting as u8),
            workers: Mutex::new(Vec::with_capacity(worker_count)),
            worker_threads: Mutex::new(Vec::with_capacity(worker_count)),
            worker_states,
            exit_rx,
            next_task_id: AtomicU64::new(1),
            instance_id,
            config,
        };

        for worker_id in 0..worker_count {
            let spawn = WorkerSpawn {
                worker_id,
                name: format!("{}-{worker_id}", scheduler.config.thread_name_prefix),
                stack_size: scheduler.config.thread_stack_size,
                state: Arc::clone(&scheduler.worker_states[worker_id]),
                ready_tx: ready_tx.clone(),
                exit_tx: exit_tx.clone(),
            };
            match spawn_worker(spawn, Arc::clone(&scheduler.shared)) {
                Ok(handle) => {
                    scheduler.worker_threads.lock().push(handle.thread_id);
                    scheduler.workers.lock().push(handle);
                }
                Err(e) => {
                    error!(worker_id = worker_id, error = %e, "Failed to spawn worker thread");
                    scheduler.abandon_startup();
                    return Err(SchedulerError::AllocationFailure(format!(
                        "failed to spawn worker {worker_id}: {e}"
                    )));
                }
            }
        }
        drop(ready_tx);
        drop(exit_tx);

        let deadline = Instant::now() + scheduler.config.startup_timeout();
        for _ in 0..worker_count {
            if ready_rx.recv_deadline(deadline).is_err() {
                error!(instance = %instance_id, "Workers did not report ready in time");
                scheduler.abandon_startup();
                return Err(SchedulerError::AllocationFailure(
                    "workers did not report ready".into(),
                ));
            }
        }

        scheduler.state.store(SchedulerState::Running as u8, Ordering::Release);
        info!(
            instance = %instance_id,
            worker_count = worker_count,
            max_queue_depth = ?scheduler.config.max_queue_depth,
            queue_order = ?scheduler.config.queue_order,
            "Scheduler running"
        );
        Ok(scheduler)
    }

    /// Tear down a scheduler whose startup failed.
    fn abandon_startup(&self) {
        self.state.store(SchedulerState::Draining as u8, Ordering::Release);
        self.shared.queue.close();
        let _ = self.join_workers(Some(self.config.abort_join_timeout()));
        self.state.store(SchedulerState::Stopped as u8, Ordering::Release);
    }

    /// Submit a task at normal priority.
    ///
    /// # Errors
    ///
    /// - `SchedulerError::SchedulerStopping` once shutdown has begun
    /// - `SchedulerError::QueueFull` if a bounded queue is at capacity
    pub fn submit<F>(&self, task: F) -> Result<TaskId, SchedulerError>
    where
        F: FnOnce(&TaskContext) -> Result<R, TaskError> + Send + 'static,
    {
        self.submit_with_priority(Priority::Normal, task)
    }

    /// Submit a task with an explicit priority (honored in priority queue order).
    ///
    /// # Errors
    ///
    /// Same as [`submit`](Self::submit).
    pub fn submit_with_priority<F>(
        &self,
        priority: Priority,
        task: F,
    ) -> Result<TaskId, SchedulerError>
    where
        F: FnOnce(&TaskContext) -> Result<R, TaskError> + Send + 'static,
    {
        if !self.state().accepts_work() {
            return Err(SchedulerError::SchedulerStopping);
        }

        let task_id = TaskId(self.next_task_id.fetch_add(1, Ordering::Relaxed));
        let slot = Arc::new(TaskSlot::new(task_id));
        self.shared.results.insert(Arc::clone(&slot));
        // Audit and count before enqueue so a fast worker can never report first
        self.shared.audit(task_id, AuditAction::Submitted, None, None);
        self.shared.counters.queued_tasks.fetch_add(1, Ordering::Relaxed);

        let job = Job {
            slot,
            body: Box::new(task),
        };
        match self.shared.queue.enqueue(priority, job) {
            Ok(()) => {
                self.shared.counters.submitted_tasks.fetch_add(1, Ordering::Relaxed);
                debug!(
                    instance = %self.instance_id,
                    task_id = %task_id,
                    priority = ?priority,
                    "Task submitted"
                );
                Ok(task_id)
            }
            Err(err) => {
                self.shared.counters.queued_tasks.fetch_sub(1, Ordering::Relaxed);
                self.shared.results.remove(task_id);
                let err = match err {
                    SchedulerError::QueueClosed => SchedulerError::SchedulerStopping,
                    other => other,
                };
                if err == SchedulerError::QueueFull {
                    warn!(instance = %self.instance_id, "Scheduler queue is full");
                }
                self.shared
                    .audit(task_id, AuditAction::Cancelled, None, Some(format!("rejected: {err}")));
                Err(err)
            }
        }
    }

    /// Block until the task finishes and consume its outcome.
    ///
    /// # Errors
    ///
    /// `SchedulerError::TaskNotFound` if the id is unknown or already consumed.
    pub fn wait(&self, task_id: TaskId) -> Result<TaskOutcome<R>, SchedulerError> {
        self.shared.results.wait(task_id, None)
    }

    /// Like [`wait`](Self::wait) with a deadline. A timed-out wait can be retried.
    ///
    /// # Errors
    ///
    /// - `SchedulerError::Timeout` if the task has not finished in time
    /// - `SchedulerError::TaskNotFound` if the id is unknown or already consumed
    pub fn wait_timeout(
        &self,
        task_id: TaskId,
        timeout: Duration,
    ) -> Result<TaskOutcome<R>, SchedulerError> {
        self.shared.results.wait(task_id, Some(timeout))
    }

    /// Wait from an async context. The blocking wait runs on tokio's blocking pool.
    ///
    /// # Errors
    ///
    /// Same as [`wait_timeout`](Self::wait_timeout), plus
    /// `SchedulerError::Internal` if the blocking task could not run.
    #[cfg(feature = "tokio-runtime")]
    pub async fn wait_async(
        &self,
        task_id: TaskId,
        timeout: Duration,
    ) -> Result<TaskOutcome<R>, SchedulerError> {
        let shared = Arc::clone(&self.shared);
        tokio::task::spawn_blocking(move || shared.results.wait(task_id, Some(timeout)))
            .await
            .map_err(|e| SchedulerError::Internal(format!("wait task failed: {e}")))?
    }

    /// Cancel a task. Queued tasks never run; running tasks are signalled and
    /// stop only if they check [`TaskContext::is_cancelled`].
    ///
    /// # Errors
    ///
    /// `SchedulerError::TaskNotFound` if the id is unknown or already consumed.
    pub fn cancel(&self, task_id: TaskId) -> Result<CancelOutcome, SchedulerError> {
        let outcome = self.shared.results.cancel(task_id)?;
        if outcome == CancelOutcome::Dequeued {
            self.shared.note_finished(task_id, TaskStatus::Cancelled, None, None);
        }
        debug!(
            instance = %self.instance_id,
            task_id = %task_id,
            outcome = ?outcome,
            "Task cancel requested"
        );
        Ok(outcome)
    }

    /// Current status of a task whose outcome has not been consumed.
    ///
    /// # Errors
    ///
    /// `SchedulerError::TaskNotFound` if the id is unknown or already consumed.
    pub fn status(&self, task_id: TaskId) -> Result<TaskStatus, SchedulerError> {
        self.shared.results.status(task_id)
    }

    /// Timing and placement of a task whose outcome has not been consumed.
    ///
    /// # Errors
    ///
    /// `SchedulerError::TaskNotFound` if the id is unknown or already consumed.
    pub fn report(&self, task_id: TaskId) -> Result<TaskReport, SchedulerError> {
        self.shared.results.report(task_id)
    }

    /// Drop a task's retained outcome without waiting for it. Returns whether
    /// anything was held. The task itself is unaffected.
    pub fn forget(&self, task_id: TaskId) -> bool {
        self.shared.results.remove(task_id)
    }

    /// Number of tasks whose outcome is still held.
    #[must_use]
    pub fn retained_results(&self) -> usize {
        self.shared.results.len()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SchedulerState {
        SchedulerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Configured worker count.
    #[must_use]
    pub const fn worker_count(&self) -> usize {
        self.config.worker_count
    }

    /// Workers that have not exited their loop.
    #[must_use]
    pub fn live_workers(&self) -> usize {
        self.worker_states()
            .into_iter()
            .filter(|s| *s != WorkerState::Stopped)
            .count()
    }

    /// State of each worker, indexed by worker id.
    #[must_use]
    pub fn worker_states(&self) -> Vec<WorkerState> {
        self.worker_states
            .iter()
            .map(|s| WorkerState::from_u8(s.load(Ordering::Acquire)))
            .collect()
    }

    /// Configuration this scheduler was started with.
    #[must_use]
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Unique id of this scheduler instance, used in logs and audit events.
    #[must_use]
    pub const fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Get current scheduler statistics.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        self.shared.counters.snapshot(self.config.worker_count)
    }

    /// Stop the scheduler and block until every worker has been joined.
    ///
    /// # Errors
    ///
    /// - `SchedulerError::SchedulerStopping` if shutdown already began
    /// - `SchedulerError::InvalidArgument` if called from one of this
    ///   scheduler's own workers (it would wait on itself)
    pub fn shutdown(&self, mode: DrainMode) -> Result<ShutdownReport, SchedulerError> {
        let current = thread::current().id();
        if self.worker_threads.lock().contains(&current) {
            return Err(SchedulerError::InvalidArgument(
                "shutdown called from a worker of the same scheduler".into(),
            ));
        }
        self.begin_draining()?;

        info!(instance = %self.instance_id, mode = ?mode, "Scheduler draining");
        self.shared.queue.close();

        let mut cancelled_tasks = 0;
        let join_timeout = match mode {
            DrainMode::Graceful => None,
            DrainMode::Abort => {
                cancelled_tasks += self.cancel_outstanding();
                Some(self.config.abort_join_timeout())
            }
        };

        let (joined_workers, detached_workers) = self.join_workers(join_timeout);
        if detached_workers > 0 {
            // Tasks still held by detached workers are reported cancelled now
            for slot in self.shared.results.running() {
                if slot.finish(TaskOutcome::Cancelled) {
                    cancelled_tasks += 1;
                    self.shared.note_finished(
                        slot.id(),
                        TaskStatus::Cancelled,
                        None,
                        Some("worker detached".into()),
                    );
                }
            }
        }

        self.state.store(SchedulerState::Stopped as u8, Ordering::Release);
        let stats = self.stats();
        info!(
            instance = %self.instance_id,
            joined = joined_workers,
            detached = detached_workers,
            cancelled = cancelled_tasks,
            completed = stats.completed_tasks,
            "Scheduler stopped"
        );

        Ok(ShutdownReport {
            mode,
            joined_workers,
            detached_workers,
            cancelled_tasks,
            stats,
        })
    }

    fn begin_draining(&self) -> Result<(), SchedulerError> {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if !SchedulerState::from_u8(current).accepts_work() {
                return Err(SchedulerError::SchedulerStopping);
            }
            match self.state.compare_exchange_weak(
                current,
                SchedulerState::Draining as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }

    /// Cancel every queued task and signal every running one. Returns how many
    /// tasks were cancelled before they started.
    fn cancel_outstanding(&self) -> u64 {
        let mut cancelled = 0;
        for job in self.shared.queue.drain() {
            self.shared.counters.queued_tasks.fetch_sub(1, Ordering::Relaxed);
            if job.slot.cancel_pending() {
                cancelled += 1;
                self.shared.note_finished(
                    job.slot.id(),
                    TaskStatus::Cancelled,
                    None,
                    Some("scheduler aborted".into()),
                );
            }
        }
        // A worker may hold a dequeued job it has not claimed yet; cancelling
        // its slot makes `begin` fail, otherwise the running task is signalled
        for slot in self.shared.results.unfinished() {
            if slot.cancel_pending() {
                cancelled += 1;
                self.shared.note_finished(
                    slot.id(),
                    TaskStatus::Cancelled,
                    None,
                    Some("scheduler aborted".into()),
                );
            } else {
                slot.token().cancel();
            }
        }
        cancelled
    }

    /// Join workers. With a timeout, workers that have not exited by then are
    /// detached. Returns `(joined, detached)`.
    fn join_workers(&self, timeout: Option<Duration>) -> (usize, usize) {
        let mut workers = self.workers.lock();
        let mut joined = 0;
        let mut detached = 0;

        let exited: Option<HashSet<usize>> = timeout.map(|timeout| {
            let deadline = Instant::now() + timeout;
            let mut exited = HashSet::with_capacity(workers.len());
            while exited.len() < workers.len() {
                match self.exit_rx.recv_deadline(deadline) {
                    Ok(worker_id) => {
                        exited.insert(worker_id);
                    }
                    Err(_) => break,
                }
            }
            exited
        });

        for worker in workers.drain(..) {
            if exited.as_ref().is_some_and(|set| !set.contains(&worker.id)) {
                warn!(worker_id = worker.id, "Worker did not exit within timeout - detaching");
                detached += 1;
                continue;
            }
            if worker.join.join().is_ok() {
                debug!(worker_id = worker.id, "Worker joined successfully");
            } else {
                warn!(worker_id = worker.id, "Worker panicked");
            }
            joined += 1;
        }
        (joined, detached)
    }
}

impl<R> Drop for Scheduler<R>
where
    R: Send + 'static,
{
    fn drop(&mut self) {
        // Signal shutdown but DON'T join workers in Drop; explicit shutdown()
        // is required for a blocking teardown
        if self.begin_draining().is_ok() {
            self.shared.queue.close();
            let cancelled = self.cancel_outstanding();
            self.state.store(SchedulerState::Stopped as u8, Ordering::Release);
            debug!(
                instance = %self.instance_id,
                cancelled = cancelled,
                "Scheduler dropped without explicit shutdown - workers will be detached"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn config(workers: usize) -> SchedulerConfig {
        SchedulerConfig::new().with_worker_count(workers)
    }

    #[test]
    fn test_start_reports_all_workers_live() {
        let scheduler = Scheduler::<()>::start(config(3), None).unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Running);
        assert_eq!(scheduler.live_workers(), 3);
        scheduler.shutdown(DrainMode::Graceful).unwrap();
        assert_eq!(scheduler.live_workers(), 0);
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }

    #[test]
    fn test_start_rejects_zero_workers() {
        let err = Scheduler::<()>::start(config(0), None).err();
        assert!(matches!(err, Some(SchedulerError::InvalidArgument(_))));
    }

    #[test]
    fn test_submit_and_wait() {
        let scheduler = Scheduler::start(config(2), None).unwrap();
        let id = scheduler.submit(|ctx| Ok(ctx.task_id().0 * 10)).unwrap();
        assert_eq!(id, TaskId(1));
        assert_eq!(scheduler.wait(id), Ok(TaskOutcome::Completed(10)));
        scheduler.shutdown(DrainMode::Graceful).unwrap();
    }

    #[test]
    fn test_submit_after_shutdown_is_rejected() {
        let scheduler = Scheduler::<u8>::start(config(1), None).unwrap();
        scheduler.shutdown(DrainMode::Graceful).unwrap();
        assert_eq!(scheduler.submit(|_| Ok(1)), Err(SchedulerError::SchedulerStopping));
        assert_eq!(
            scheduler.shutdown(DrainMode::Graceful).err(),
            Some(SchedulerError::SchedulerStopping)
        );
    }

    #[test]
    fn test_shutdown_from_own_worker_is_rejected() {
        type Outcome = Result<ShutdownReport, SchedulerError>;
        let scheduler = Arc::new(Scheduler::<Outcome>::start(config(1), None).unwrap());
        let inner = Arc::clone(&scheduler);
        let id = scheduler
            .submit(move |_| Ok(inner.shutdown(DrainMode::Graceful)))
            .unwrap();

        let outcome = scheduler.wait(id).unwrap();
        assert!(matches!(
            outcome,
            TaskOutcome::Completed(Err(SchedulerError::InvalidArgument(_)))
        ));
        scheduler.shutdown(DrainMode::Graceful).unwrap();
    }

    #[test]
    fn test_abort_cancels_dequeued_but_unclaimed_task() {
        let scheduler = Scheduler::<()>::start(config(1), None).unwrap();
        // A slot with no queue entry, as if a worker had dequeued it and not yet begun
        let slot = Arc::new(TaskSlot::new(TaskId(900)));
        scheduler.shared.results.insert(Arc::clone(&slot));

        let report = scheduler.shutdown(DrainMode::Abort).unwrap();
        assert_eq!(report.cancelled_tasks, 1);
        assert_eq!(report.detached_workers, 0);
        assert_eq!(slot.status(), TaskStatus::Cancelled);
        assert!(slot.token().is_cancelled());
        assert!(!slot.begin(0));
        assert_eq!(scheduler.wait(TaskId(900)), Ok(TaskOutcome::Cancelled));
    }

    #[test]
    fn test_drop_without_shutdown_does_not_block() {
        let ran = Arc::new(AtomicUsize::new(0));
        {
            let scheduler = Scheduler::<()>::start(config(1), None).unwrap();
            let ran = Arc::clone(&ran);
            scheduler
                .submit(move |ctx| {
                    while !ctx.is_cancelled() {
                        thread::sleep(Duration::from_millis(5));
                    }
                    ran.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .unwrap();
            thread::sleep(Duration::from_millis(20));
        }
        // The running task was signalled by drop and exits on its own
        let deadline = Instant::now() + Duration::from_secs(2);
        while ran.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}
