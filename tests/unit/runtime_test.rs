//! Tests for the process-wide default scheduler

use prometheus_task_scheduler::config::{DrainMode, SchedulerConfig};
use prometheus_task_scheduler::core::{SchedulerError, TaskOutcome};
use prometheus_task_scheduler::runtime::{default_handle, init_default, registry, shutdown_default};

// The default scheduler is process-wide state; keep its whole lifecycle in one test.
#[test]
fn test_default_scheduler_lifecycle() {
    assert_eq!(default_handle(), Err(SchedulerError::NotInitialized));
    assert_eq!(
        shutdown_default(DrainMode::Graceful).err(),
        Some(SchedulerError::NotInitialized)
    );

    let handle = init_default(SchedulerConfig::new().with_worker_count(2)).expect("init default");
    assert_eq!(default_handle(), Ok(handle));
    assert_eq!(
        init_default(SchedulerConfig::new()).err(),
        Some(SchedulerError::AlreadyInitialized)
    );

    let id = registry().submit(handle, |_| Ok(())).unwrap();
    assert_eq!(registry().wait(handle, id), Ok(TaskOutcome::Completed(())));

    let report = shutdown_default(DrainMode::Graceful).expect("shutdown default");
    assert_eq!(report.joined_workers, 2);
    assert_eq!(default_handle(), Err(SchedulerError::NotInitialized));
    assert_eq!(registry().resolve(handle).err(), Some(SchedulerError::InvalidHandle));

    let again = init_default(SchedulerConfig::new().with_worker_count(1)).expect("re-init default");
    assert_ne!(again, handle);
    shutdown_default(DrainMode::Abort).unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_wait_async_through_registry() {
    let handle = registry().create(1).unwrap();
    let scheduler = registry().resolve(handle).unwrap();

    let id = scheduler.submit(|_| Ok(())).unwrap();
    let outcome = scheduler
        .wait_async(id, std::time::Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(outcome, TaskOutcome::Completed(()));

    drop(scheduler);
    registry().destroy(handle).unwrap();
}
