//! Tests for audit sink

use prometheus_task_scheduler::core::{
    build_audit_event, AuditAction, AuditSink, InMemoryAuditSink, TaskId, TracingAuditSink,
};

#[test]
fn test_in_memory_audit_sink() {
    let sink = InMemoryAuditSink::new(10);

    let event = build_audit_event(
        "instance-1",
        TaskId(1),
        AuditAction::Submitted,
        None,
        Some("payload".to_string()),
    );

    sink.record(event);
    assert_eq!(sink.events().len(), 1);

    let events = sink.events();
    assert_eq!(events[0].instance, "instance-1");
    assert_eq!(events[0].task_id, TaskId(1));
    assert_eq!(events[0].action, AuditAction::Submitted);
}

#[test]
fn test_audit_sink_overflow() {
    let sink = InMemoryAuditSink::new(2);

    sink.record(build_audit_event("i", TaskId(1), AuditAction::Submitted, None, None));
    sink.record(build_audit_event("i", TaskId(2), AuditAction::Submitted, None, None));
    sink.record(build_audit_event("i", TaskId(3), AuditAction::Submitted, None, None));

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].task_id, TaskId(2)); // First one popped
    assert_eq!(events[1].task_id, TaskId(3));
}

#[test]
fn test_clones_share_buffer_and_filter_by_task() {
    let sink = InMemoryAuditSink::new(16);
    let clone = sink.clone();

    clone.record(build_audit_event("i", TaskId(1), AuditAction::Started, Some(0), None));
    clone.record(build_audit_event("i", TaskId(2), AuditAction::Started, Some(1), None));
    clone.record(build_audit_event("i", TaskId(1), AuditAction::Succeeded, Some(0), None));

    assert_eq!(
        sink.events_for(TaskId(1)),
        vec![AuditAction::Started, AuditAction::Succeeded]
    );
}

#[test]
fn test_build_audit_event() {
    let event = build_audit_event(
        "instance-1",
        TaskId(9),
        AuditAction::Failed,
        Some(3),
        Some("panicked: boom".to_string()),
    );
    assert_eq!(event.worker_id, Some(3));
    assert_eq!(event.detail.as_deref(), Some("panicked: boom"));
    assert!(event.created_at_ms > 0);

    let json = serde_json::to_string(&event).unwrap();
    assert!(json.contains("\"action\":\"failed\""));
}

#[test]
fn test_tracing_sink_accepts_events() {
    let sink = TracingAuditSink;
    sink.record(build_audit_event("i", TaskId(1), AuditAction::Finished, Some(0), None));
}
