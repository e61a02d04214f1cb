//! # Prometheus Task Scheduler
//!
//! A fixed-size worker pool behind an opaque, generation-checked handle.
//!
//! A caller creates a scheduler with a worker count and gets back a [`core::Handle`].
//! Tasks submitted through the handle are queued and executed by the workers;
//! destroying the handle stops the scheduler and blocks until every worker has
//! exited. Stale or forged handles are rejected, never dereferenced.
//!
//! ## Key Features
//!
//! - **Handle Registry**: handles are `(generation, index)` pairs into an arena, so a
//!   destroyed handle stays invalid even after its slot is reused
//! - **Blocking Workers**: workers park on a condition variable, never poll
//! - **Task Outcomes**: each task ends `Completed`, `Failed` (error or caught panic) or
//!   `Cancelled`; a failing task never takes its worker down
//! - **Drain Modes**: graceful shutdown runs everything queued; abort cancels queued
//!   work and signals running work cooperatively
//! - **C ABI**: `pts_*` functions over the process-wide registry, integers only
//!
//! ## Example
//!
//! ```rust
//! use prometheus_task_scheduler::config::DrainMode;
//! use prometheus_task_scheduler::core::{HandleRegistry, TaskOutcome};
//!
//! let registry = HandleRegistry::<u64>::new();
//! let handle = registry.create(4)?;
//!
//! let task = registry.submit(handle, |ctx| Ok(ctx.task_id().0 * 2))?;
//! assert_eq!(registry.wait(handle, task)?, TaskOutcome::Completed(2));
//!
//! registry.destroy_with(handle, DrainMode::Graceful)?;
//! assert!(registry.resolve(handle).is_err());
//! # Ok::<(), prometheus_task_scheduler::core::SchedulerError>(())
//! ```
//!
//! For complete examples, see:
//! - `tests/scheduler_test.rs` - lifecycle and drain scenarios
//! - `tests/ffi_test.rs` - the C ABI

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions: tasks, queue, workers, scheduler, and handles.
pub mod core;
/// Scheduler configuration and environment loading.
pub mod config;
/// Builders to construct schedulers from configuration.
pub mod builders;
/// Status codes, the process-wide registry, and the C ABI.
pub mod runtime;
/// Shared utilities.
pub mod util;
