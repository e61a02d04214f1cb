//! Configuration models for schedulers, queues, and drain behavior.

pub mod scheduler;

pub use scheduler::{DrainMode, QueueOrder, SchedulerConfig};
