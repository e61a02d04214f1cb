//! Tests for the task queue public API

use prometheus_task_scheduler::config::QueueOrder;
use prometheus_task_scheduler::core::{Dequeued, Priority, SchedulerError, TaskQueue};

#[test]
fn test_drain_returns_items_in_dequeue_order() {
    let queue = TaskQueue::new(QueueOrder::Priority, None);
    queue.enqueue(Priority::Low, "low").unwrap();
    queue.enqueue(Priority::High, "high").unwrap();
    queue.enqueue(Priority::Normal, "normal").unwrap();

    assert_eq!(queue.len(), 3);
    assert_eq!(queue.drain(), vec!["high", "normal", "low"]);
    assert!(queue.is_empty());
    assert_eq!(queue.try_dequeue(), None);
}

#[test]
fn test_closed_queue_drains_before_reporting_closed() {
    let queue = TaskQueue::new(QueueOrder::Fifo, Some(4));
    assert_eq!(queue.max_depth(), Some(4));
    queue.enqueue(Priority::Normal, 1).unwrap();
    queue.close();

    assert!(queue.is_closed());
    assert_eq!(queue.enqueue(Priority::Normal, 2), Err(SchedulerError::QueueClosed));
    assert_eq!(queue.dequeue_blocking(), Dequeued::Task(1));
    assert_eq!(queue.dequeue_blocking(), Dequeued::Closed);
}
