//! Tests for builder modules

use std::sync::Arc;

use prometheus_task_scheduler::builders::SchedulerBuilder;
use prometheus_task_scheduler::config::{DrainMode, SchedulerConfig};
use prometheus_task_scheduler::core::{AuditAction, AuditSink, InMemoryAuditSink, SchedulerError};

#[test]
fn test_scheduler_builder_config() {
    let builder = SchedulerBuilder::<()>::new(SchedulerConfig::new().with_worker_count(2));
    assert_eq!(builder.config().worker_count, 2);

    let scheduler = builder.build().expect("build scheduler");
    assert_eq!(scheduler.worker_count(), 2);
    scheduler.shutdown(DrainMode::Graceful).unwrap();
}

#[test]
fn test_scheduler_builder_rejects_invalid_config() {
    let result = SchedulerBuilder::<()>::new(SchedulerConfig::new().with_worker_count(0)).build();
    assert!(matches!(result, Err(SchedulerError::InvalidArgument(_))));
}

#[test]
fn test_scheduler_builder_shared_audit_sink() {
    let sink = InMemoryAuditSink::new(32);
    let shared: Arc<dyn AuditSink> = Arc::new(sink.clone());

    let scheduler = SchedulerBuilder::<u8>::new(SchedulerConfig::new().with_worker_count(1))
        .with_audit_arc(shared)
        .build()
        .expect("build scheduler");
    let id = scheduler.submit(|_| Ok(1)).unwrap();
    scheduler.shutdown(DrainMode::Graceful).unwrap();

    assert_eq!(sink.events_for(id).first(), Some(&AuditAction::Submitted));
}
