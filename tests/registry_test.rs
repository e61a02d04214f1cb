//! Integration tests for HandleRegistry
//!
//! Handle validity across create/destroy cycles, isolation between
//! schedulers, and concurrent lifecycle churn.

use prometheus_task_scheduler::builders::SchedulerBuilder;
use prometheus_task_scheduler::config::{DrainMode, SchedulerConfig};
use prometheus_task_scheduler::core::{
    Handle, HandleRegistry, SchedulerError, SchedulerState, TaskOutcome, WorkerState,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_create_zero_workers_allocates_nothing() {
    let registry = HandleRegistry::<()>::new();
    assert!(matches!(
        registry.create(0),
        Err(SchedulerError::InvalidArgument(_))
    ));
    assert!(registry.is_empty());
    assert!(registry.handles().is_empty());
}

#[test]
fn test_create_reports_live_workers() {
    let registry = HandleRegistry::<()>::new();
    let handle = registry.create(3).unwrap();
    assert!(!handle.is_null());

    let scheduler = registry.resolve(handle).unwrap();
    assert_eq!(scheduler.worker_count(), 3);
    assert_eq!(scheduler.live_workers(), 3);
    assert_eq!(scheduler.state(), SchedulerState::Running);
    drop(scheduler);

    registry.destroy(handle).unwrap();
}

#[test]
fn test_double_destroy_is_invalid_handle() {
    let registry = HandleRegistry::<()>::new();
    let handle = registry.create(2).unwrap();

    let report = registry.destroy(handle).unwrap();
    assert_eq!(report.joined_workers, 2);
    assert_eq!(registry.destroy(handle).err(), Some(SchedulerError::InvalidHandle));
    assert!(registry.is_empty());
}

#[test]
fn test_stale_handle_rejected_after_slot_reuse() {
    let registry = HandleRegistry::<u32>::new();
    let old = registry.create(1).unwrap();
    registry.destroy(old).unwrap();
    let new = registry.create(1).unwrap();
    assert_ne!(old, new);

    assert_eq!(registry.submit(old, |_| Ok(1)).err(), Some(SchedulerError::InvalidHandle));
    assert_eq!(registry.stats(old).err(), Some(SchedulerError::InvalidHandle));

    let id = registry.submit(new, |_| Ok(2)).unwrap();
    assert_eq!(registry.wait(new, id), Ok(TaskOutcome::Completed(2)));
    registry.destroy(new).unwrap();
}

#[test]
fn test_forged_and_null_handles_rejected() {
    let registry = HandleRegistry::<()>::new();
    let handle = registry.create(1).unwrap();
    let forged = Handle::from_raw(handle.as_raw() ^ (1 << 40));

    assert_eq!(registry.resolve(Handle::NULL).err(), Some(SchedulerError::InvalidHandle));
    assert_eq!(registry.resolve(forged).err(), Some(SchedulerError::InvalidHandle));
    assert_eq!(registry.destroy(forged).err(), Some(SchedulerError::InvalidHandle));
    assert!(registry.resolve(handle).is_ok());
    registry.destroy(handle).unwrap();
}

#[test]
fn test_destroying_one_scheduler_leaves_others_running() {
    let registry = HandleRegistry::<usize>::new();
    let first = registry.create(2).unwrap();
    let second = registry.create(2).unwrap();
    assert_eq!(registry.len(), 2);

    registry.destroy_with(first, DrainMode::Abort).unwrap();

    let id = registry.submit(second, |ctx| Ok(ctx.worker_id())).unwrap();
    assert!(matches!(registry.wait(second, id), Ok(TaskOutcome::Completed(w)) if w < 2));
    assert_eq!(registry.handles(), vec![second]);
    registry.destroy(second).unwrap();
}

#[test]
fn test_destroy_from_own_worker_is_refused() {
    let registry = Arc::new(HandleRegistry::<Option<SchedulerError>>::new());
    let handle = registry.create(1).unwrap();

    // Hold the scheduler directly; the handle does not resolve while the
    // refused destroy is in progress
    let scheduler = registry.resolve(handle).unwrap();
    let inner = Arc::clone(&registry);
    let id = scheduler
        .submit(move |_| Ok(inner.destroy(handle).err()))
        .unwrap();

    let outcome = scheduler.wait(id).unwrap();
    drop(scheduler);
    assert!(matches!(
        outcome,
        TaskOutcome::Completed(Some(SchedulerError::InvalidArgument(_)))
    ));
    assert!(registry.resolve(handle).is_ok());
    registry.destroy(handle).unwrap();
}

#[test]
fn test_destroy_after_direct_shutdown_releases_handle() {
    let registry = HandleRegistry::<()>::new();
    let handle = registry.create(2).unwrap();

    let report = registry.resolve(handle).unwrap().shutdown(DrainMode::Graceful).unwrap();
    assert_eq!(report.joined_workers, 2);

    assert_eq!(registry.destroy(handle).err(), Some(SchedulerError::SchedulerStopping));
    assert_eq!(registry.resolve(handle).err(), Some(SchedulerError::InvalidHandle));
    assert_eq!(registry.destroy(handle).err(), Some(SchedulerError::InvalidHandle));
    assert!(registry.is_empty());
}

#[test]
fn test_snapshots_describe_live_schedulers() {
    let registry = HandleRegistry::<()>::new();
    let handle = registry.create(2).unwrap();

    let snapshots = registry.snapshots();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].handle, handle);
    assert_eq!(snapshots[0].state, SchedulerState::Running);
    assert_eq!(snapshots[0].workers, vec![WorkerState::Idle, WorkerState::Idle]);

    let json = serde_json::to_string(&snapshots[0]).unwrap();
    assert!(json.contains("\"state\":\"running\""));
    registry.destroy(handle).unwrap();
}

#[test]
fn test_template_and_builder_registration() {
    let template = SchedulerConfig::new().with_thread_name_prefix("templated");
    let registry = HandleRegistry::<()>::with_template(template);
    let handle = registry.create(1).unwrap();
    assert_eq!(
        registry.resolve(handle).unwrap().config().thread_name_prefix,
        "templated"
    );

    let built = SchedulerBuilder::new(SchedulerConfig::new().with_worker_count(2))
        .register(&registry)
        .unwrap();
    assert_eq!(registry.resolve(built).unwrap().worker_count(), 2);

    let results = registry.destroy_all(DrainMode::Graceful);
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|(_, r)| r.is_ok()));
    assert!(registry.is_empty());
}

#[test]
fn test_concurrent_create_destroy_churn() {
    let registry = Arc::new(HandleRegistry::<u64>::new());

    let churners: Vec<_> = (0..6)
        .map(|t| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for round in 0..5_u64 {
                    let handle = registry.create(2).unwrap();
                    let id = registry.submit(handle, move |_| Ok(t * 100 + round)).unwrap();
                    let value = registry
                        .wait_timeout(handle, id, Duration::from_secs(5))
                        .unwrap()
                        .into_result()
                        .unwrap();
                    assert_eq!(value, t * 100 + round);
                    registry.destroy(handle).unwrap();
                    assert_eq!(registry.resolve(handle).err(), Some(SchedulerError::InvalidHandle));
                }
            })
        })
        .collect();

    for churner in churners {
        churner.join().expect("Churn thread panicked");
    }
    assert!(registry.is_empty());
}
