//! Tests for utility functions

use prometheus_task_scheduler::util::{
    init_tracing, init_tracing_with, now_ms, DEFAULT_LOG_DIRECTIVE,
};

#[test]
fn test_now_ms_advances() {
    let before = now_ms();
    std::thread::sleep(std::time::Duration::from_millis(2));
    assert!(now_ms() > before);
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    init_tracing_with("debug");
    assert!(DEFAULT_LOG_DIRECTIVE.starts_with("prometheus_task_scheduler"));
}
