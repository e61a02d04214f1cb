//! Tests for configuration validation

use std::collections::HashMap;
use std::time::Duration;

use prometheus_task_scheduler::config::{DrainMode, QueueOrder, SchedulerConfig};

#[test]
fn test_default_config_is_valid() {
    let config = SchedulerConfig::default();
    assert!(config.validate().is_ok());
    assert!(config.worker_count >= 1);
    assert_eq!(config.max_queue_depth, None);
    assert_eq!(config.queue_order, QueueOrder::Fifo);
    assert_eq!(config.drain_mode, DrainMode::Graceful);
}

#[test]
fn test_config_invalid_worker_count() {
    let invalid = SchedulerConfig::new().with_worker_count(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_config_invalid_queue_depth() {
    let invalid = SchedulerConfig::new().with_max_queue_depth(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_config_invalid_thread_prefix() {
    let invalid = SchedulerConfig::new().with_thread_name_prefix("");
    assert!(invalid.validate().is_err());
}

#[test]
fn test_config_from_json() {
    let json = r#"{
        "worker_count": 3,
        "max_queue_depth": 64,
        "queue_order": "priority",
        "drain_mode": "abort",
        "abort_join_timeout_ms": 250
    }"#;
    let config = SchedulerConfig::from_json_str(json).expect("valid config");
    assert_eq!(config.worker_count, 3);
    assert_eq!(config.max_queue_depth, Some(64));
    assert_eq!(config.queue_order, QueueOrder::Priority);
    assert_eq!(config.drain_mode, DrainMode::Abort);
    assert_eq!(config.abort_join_timeout(), Duration::from_millis(250));
    assert_eq!(config.thread_name_prefix, "pts-worker");
}

#[test]
fn test_config_from_json_rejects_invalid() {
    assert!(SchedulerConfig::from_json_str(r#"{"worker_count": 0}"#).is_err());
    assert!(SchedulerConfig::from_json_str("not json").is_err());
}

#[test]
fn test_config_from_lookup() {
    let vars: HashMap<&str, &str> = [
        ("PTS_WORKER_COUNT", "5"),
        ("PTS_QUEUE_ORDER", "Priority"),
        ("PTS_DRAIN_MODE", "ABORT"),
        ("PTS_THREAD_NAME_PREFIX", "env-worker"),
    ]
    .into_iter()
    .collect();

    let config = SchedulerConfig::from_lookup(|key| vars.get(key).map(|v| (*v).to_string()))
        .expect("valid env config");
    assert_eq!(config.worker_count, 5);
    assert_eq!(config.queue_order, QueueOrder::Priority);
    assert_eq!(config.drain_mode, DrainMode::Abort);
    assert_eq!(config.thread_name_prefix, "env-worker");
}

#[test]
fn test_config_from_lookup_reports_bad_values() {
    let err = SchedulerConfig::from_lookup(|key| {
        (key == "PTS_WORKER_COUNT").then(|| "many".to_string())
    })
    .unwrap_err();
    assert!(err.contains("PTS_WORKER_COUNT"));

    let err = SchedulerConfig::from_lookup(|key| {
        (key == "PTS_DRAIN_MODE").then(|| "later".to_string())
    })
    .unwrap_err();
    assert!(err.contains("later"));
}
