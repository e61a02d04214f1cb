//! Handle registry: a generational arena from opaque handles to live schedulers.
//!
//! A [`Handle`] packs a slot index and a generation. Destroying a handle bumps
//! its slot's generation before the slot is reused, so a stale handle can never
//! resolve to a newer scheduler. A slot whose generation would wrap is retired.
//!
//! The registry lock covers slot bookkeeping only. Scheduler startup and
//! teardown run outside it, so destroying one handle never stalls lookups of
//! another for longer than a slot check.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::builders::SchedulerBuilder;
use crate::config::{DrainMode, SchedulerConfig};
use crate::core::error::{SchedulerError, TaskError};
use crate::core::scheduler::{Scheduler, ShutdownReport};
use crate::core::stats::SchedulerStats;
use crate::core::task::{
    CancelOutcome, Priority, TaskContext, TaskId, TaskOutcome, TaskReport, TaskStatus,
};
use crate::runtime::api::SchedulerSnapshot;

/// Opaque, generation-checked scheduler handle.
///
/// Valid handles are never zero; [`Handle::NULL`] is the failure sentinel
/// handed across the C boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Handle(u64);

impl Handle {
    /// Sentinel returned when a scheduler could not be created.
    pub const NULL: Self = Self(0);

    const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | index as u64)
    }

    /// Rebuild a handle from its raw value.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw value for crossing a foreign boundary.
    #[must_use]
    pub const fn as_raw(self) -> u64 {
        self.0
    }

    /// Whether this is the null sentinel.
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    #[allow(clippy::cast_possible_truncation)]
    const fn index(self) -> usize {
        (self.0 & 0xFFFF_FFFF) as u32 as usize
    }

    #[allow(clippy::cast_possible_truncation)]
    const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

enum Slot<R: Send + 'static> {
    Vacant { generation: u32 },
    Occupied { generation: u32, scheduler: Arc<Scheduler<R>> },
    Retiring,
    Retired,
}

struct Slots<R: Send + 'static> {
    slots: Vec<Slot<R>>,
    free: Vec<u32>,
    live: usize,
}

/// Registry mapping handles to live schedulers.
pub struct HandleRegistry<R>
where
    R: Send + 'static,
{
    inner: Mutex<Slots<R>>,
    template: SchedulerConfig,
}

impl<R> Default for HandleRegistry<R>
where
    R: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<R> HandleRegistry<R>
where
    R: Send + 'static,
{
    /// Empty registry; `create` uses [`SchedulerConfig::default`] for
    /// everything but the worker count.
    #[must_use]
    pub fn new() -> Self {
        Self::with_template(SchedulerConfig::default())
    }

    /// Empty registry whose `create` starts from `template`.
    #[must_use]
    pub const fn with_template(template: SchedulerConfig) -> Self {
        Self {
            inner: Mutex::new(Slots {
                slots: Vec::new(),
                free: Vec::new(),
                live: 0,
            }),
            template,
        }
    }

    /// Create and start a scheduler with `worker_count` workers.
    ///
    /// # Errors
    ///
    /// - `SchedulerError::InvalidArgument` if `worker_count` is 0 (nothing is allocated)
    /// - `SchedulerError::AllocationFailure` if workers or a slot cannot be allocated
    pub fn create(&self, worker_count: usize) -> Result<Handle, SchedulerError> {
        if worker_count == 0 {
            return Err(SchedulerError::InvalidArgument(
                "worker count must be greater than 0".into(),
            ));
        }
        self.create_with(self.template.clone().with_worker_count(worker_count))
    }

    /// Create and start a scheduler from a full configuration.
    ///
    /// # Errors
    ///
    /// Same as [`create`](Self::create).
    pub fn create_with(&self, config: SchedulerConfig) -> Result<Handle, SchedulerError> {
        self.register(SchedulerBuilder::new(config))
    }

    /// Build a scheduler from `builder` and register it under a fresh handle.
    ///
    /// # Errors
    ///
    /// Same as [`create`](Self::create).
    pub fn register(&self, builder: SchedulerBuilder<R>) -> Result<Handle, SchedulerError> {
        let scheduler = Arc::new(builder.build()?);
        self.insert(scheduler)
    }

    fn insert(&self, scheduler: Arc<Scheduler<R>>) -> Result<Handle, SchedulerError> {
        let handle = {
            let mut inner = self.inner.lock();
            let index = match inner.free.pop() {
                Some(index) => Some(index),
                None => u32::try_from(inner.slots.len()).ok().map(|index| {
                    inner.slots.push(Slot::Vacant { generation: 1 });
                    index
                }),
            };
            index.and_then(|index| {
                let slot = &mut inner.slots[index as usize];
                let Slot::Vacant { generation } = *slot else {
                    return None;
                };
                *slot = Slot::Occupied {
                    generation,
                    scheduler: Arc::clone(&scheduler),
                };
                inner.live += 1;
                Some(Handle::new(index, generation))
            })
        };

        if let Some(handle) = handle {
            info!(handle = %handle, instance = %scheduler.instance_id(), "Scheduler registered");
            Ok(handle)
        } else {
            warn!("Handle registry exhausted");
            let _ = scheduler.shutdown(DrainMode::Abort);
            Err(SchedulerError::AllocationFailure("handle registry exhausted".into()))
        }
    }

    /// Look up the scheduler behind a handle.
    ///
    /// # Errors
    ///
    /// `SchedulerError::InvalidHandle` if the handle was never issued, is being
    /// destroyed, or has been destroyed.
    pub fn resolve(&self, handle: Handle) -> Result<Arc<Scheduler<R>>, SchedulerError> {
        let inner = self.inner.lock();
        match inner.slots.get(handle.index()) {
            Some(Slot::Occupied {
                generation,
                scheduler,
            }) if *generation == handle.generation() => Ok(Arc::clone(scheduler)),
            _ => Err(SchedulerError::InvalidHandle),
        }
    }

    /// Destroy a handle using its scheduler's configured drain mode.
    ///
    /// # Errors
    ///
    /// See [`destroy_with`](Self::destroy_with).
    pub fn destroy(&self, handle: Handle) -> Result<ShutdownReport, SchedulerError> {
        self.destroy_inner(handle, None)
    }

    /// Invalidate a handle, stop its scheduler, and block until every worker
    /// has been joined (or detached after the abort timeout).
    ///
    /// The handle stops resolving as soon as this begins; its slot is released
    /// only after the scheduler has stopped.
    ///
    /// # Errors
    ///
    /// - `SchedulerError::InvalidHandle` for unknown or already-destroyed
    ///   handles, including a second destroy of the same handle
    /// - `SchedulerError::InvalidArgument` if called from one of the
    ///   scheduler's own workers; the handle stays live
    /// - `SchedulerError::SchedulerStopping` if the scheduler was already shut
    ///   down through a resolved reference; the handle is still released
    pub fn destroy_with(
        &self,
        handle: Handle,
        mode: DrainMode,
    ) -> Result<ShutdownReport, SchedulerError> {
        self.destroy_inner(handle, Some(mode))
    }

    fn destroy_inner(
        &self,
        handle: Handle,
        mode: Option<DrainMode>,
    ) -> Result<ShutdownReport, SchedulerError> {
        let scheduler = {
            let mut inner = self.inner.lock();
            let Some(slot) = inner.slots.get_mut(handle.index()) else {
                return Err(SchedulerError::InvalidHandle);
            };
            match &*slot {
                Slot::Occupied { generation, .. } if *generation == handle.generation() => {}
                _ => return Err(SchedulerError::InvalidHandle),
            }
            let previous = std::mem::replace(slot, Slot::Retiring);
            let Slot::Occupied { scheduler, .. } = previous else {
                return Err(SchedulerError::InvalidHandle);
            };
            scheduler
        };

        let mode = mode.unwrap_or(scheduler.config().drain_mode);
        debug!(handle = %handle, mode = ?mode, "Destroying scheduler");
        let report = scheduler.shutdown(mode);

        let mut inner = self.inner.lock();
        let index = handle.index();
        if let Err(SchedulerError::InvalidArgument(reason)) = &report {
            // Shutdown refused (called from the scheduler's own worker); the handle stays live
            warn!(handle = %handle, reason = %reason, "Destroy refused");
            if let Some(slot) = inner.slots.get_mut(index) {
                *slot = Slot::Occupied {
                    generation: handle.generation(),
                    scheduler,
                };
            }
            return report;
        }
        if let Some(slot) = inner.slots.get_mut(index) {
            if let Some(next) = handle.generation().checked_add(1) {
                *slot = Slot::Vacant { generation: next };
                if let Ok(index) = u32::try_from(index) {
                    inner.free.push(index);
                }
            } else {
                *slot = Slot::Retired;
            }
        }
        inner.live = inner.live.saturating_sub(1);
        drop(inner);

        info!(handle = %handle, "Scheduler destroyed");
        report
    }

    /// Destroy every live handle. Returns the reports in handle order.
    pub fn destroy_all(
        &self,
        mode: DrainMode,
    ) -> Vec<(Handle, Result<ShutdownReport, SchedulerError>)> {
        self.handles()
            .into_iter()
            .map(|handle| (handle, self.destroy_with(handle, mode)))
            .collect()
    }

    /// Handles currently valid.
    #[must_use]
    pub fn handles(&self) -> Vec<Handle> {
        let inner = self.inner.lock();
        inner
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                Slot::Occupied { generation, .. } => {
                    u32::try_from(index).ok().map(|index| Handle::new(index, *generation))
                }
                _ => None,
            })
            .collect()
    }

    /// Number of live schedulers (including ones being destroyed).
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().live
    }

    /// Whether no schedulers are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every live scheduler.
    #[must_use]
    pub fn snapshots(&self) -> Vec<SchedulerSnapshot> {
        self.handles()
            .into_iter()
            .filter_map(|handle| {
                self.resolve(handle)
                    .ok()
                    .map(|scheduler| SchedulerSnapshot::capture(handle, &scheduler))
            })
            .collect()
    }

    /// Submit a task through a handle.
    ///
    /// # Errors
    ///
    /// `SchedulerError::InvalidHandle`, or any error of [`Scheduler::submit`].
    pub fn submit<F>(&self, handle: Handle, task: F) -> Result<TaskId, SchedulerError>
    where
        F: FnOnce(&TaskContext) -> Result<R, TaskError> + Send + 'static,
    {
        self.resolve(handle)?.submit(task)
    }

    /// Submit a prioritized task through a handle.
    ///
    /// # Errors
    ///
    /// `SchedulerError::InvalidHandle`, or any error of [`Scheduler::submit`].
    pub fn submit_with_priority<F>(
        &self,
        handle: Handle,
        priority: Priority,
        task: F,
    ) -> Result<TaskId, SchedulerError>
    where
        F: FnOnce(&TaskContext) -> Result<R, TaskError> + Send + 'static,
    {
        self.resolve(handle)?.submit_with_priority(priority, task)
    }

    /// Wait for a task's outcome through a handle.
    ///
    /// # Errors
    ///
    /// `SchedulerError::InvalidHandle`, or any error of [`Scheduler::wait`].
    pub fn wait(&self, handle: Handle, task_id: TaskId) -> Result<TaskOutcome<R>, SchedulerError> {
        self.resolve(handle)?.wait(task_id)
    }

    /// Wait with a deadline through a handle.
    ///
    /// # Errors
    ///
    /// `SchedulerError::InvalidHandle`, or any error of [`Scheduler::wait_timeout`].
    pub fn wait_timeout(
        &self,
        handle: Handle,
        task_id: TaskId,
        timeout: Duration,
    ) -> Result<TaskOutcome<R>, SchedulerError> {
        self.resolve(handle)?.wait_timeout(task_id, timeout)
    }

    /// Cancel a task through a handle.
    ///
    /// # Errors
    ///
    /// `SchedulerError::InvalidHandle`, or any error of [`Scheduler::cancel`].
    pub fn cancel(&self, handle: Handle, task_id: TaskId) -> Result<CancelOutcome, SchedulerError> {
        self.resolve(handle)?.cancel(task_id)
    }

    /// Task status through a handle.
    ///
    /// # Errors
    ///
    /// `SchedulerError::InvalidHandle`, or any error of [`Scheduler::status`].
    pub fn status(&self, handle: Handle, task_id: TaskId) -> Result<TaskStatus, SchedulerError> {
        self.resolve(handle)?.status(task_id)
    }

    /// Task report through a handle.
    ///
    /// # Errors
    ///
    /// `SchedulerError::InvalidHandle`, or any error of [`Scheduler::report`].
    pub fn report(&self, handle: Handle, task_id: TaskId) -> Result<TaskReport, SchedulerError> {
        self.resolve(handle)?.report(task_id)
    }

    /// Drop a task's retained outcome through a handle.
    ///
    /// # Errors
    ///
    /// `SchedulerError::InvalidHandle` if the handle is not live.
    pub fn forget(&self, handle: Handle, task_id: TaskId) -> Result<bool, SchedulerError> {
        Ok(self.resolve(handle)?.forget(task_id))
    }

    /// Scheduler statistics through a handle.
    ///
    /// # Errors
    ///
    /// `SchedulerError::InvalidHandle` if the handle is not live.
    pub fn stats(&self, handle: Handle) -> Result<SchedulerStats, SchedulerError> {
        Ok(self.resolve(handle)?.stats())
    }
}
