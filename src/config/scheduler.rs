//! Scheduler configuration structures.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable prefix read by [`SchedulerConfig::from_env`].
pub const ENV_PREFIX: &str = "PTS_";

/// Order in which queued tasks are handed to workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueOrder {
    /// Strict arrival order; task priority is ignored.
    #[default]
    Fifo,
    /// Highest priority first, arrival order within a priority.
    Priority,
}

impl FromStr for QueueOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fifo" => Ok(Self::Fifo),
            "priority" => Ok(Self::Priority),
            other => Err(format!("unknown queue order `{other}`")),
        }
    }
}

/// What happens to outstanding work when a scheduler is destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainMode {
    /// Run every queued task to completion before workers exit.
    #[default]
    Graceful,
    /// Cancel queued tasks and signal running ones to stop.
    Abort,
}

impl FromStr for DrainMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "graceful" => Ok(Self::Graceful),
            "abort" => Ok(Self::Abort),
            other => Err(format!("unknown drain mode `{other}`")),
        }
    }
}

/// Scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Number of worker threads, fixed for the scheduler's lifetime.
    pub worker_count: usize,
    /// Maximum queued tasks before rejection; `None` for unbounded.
    pub max_queue_depth: Option<usize>,
    /// Dequeue order.
    pub queue_order: QueueOrder,
    /// Drain mode used when destroy does not name one.
    pub drain_mode: DrainMode,
    /// How long an abort waits for workers before detaching them, in milliseconds.
    pub abort_join_timeout_ms: u64,
    /// How long create waits for every worker to report ready, in milliseconds.
    pub startup_timeout_ms: u64,
    /// Stack size for worker threads; platform default when `None`.
    pub thread_stack_size: Option<usize>,
    /// Worker thread name prefix; threads are named `{prefix}-{id}`.
    pub thread_name_prefix: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get().max(1),
            max_queue_depth: None,
            queue_order: QueueOrder::Fifo,
            drain_mode: DrainMode::Graceful,
            abort_join_timeout_ms: 2_000,
            startup_timeout_ms: 5_000,
            thread_stack_size: None,
            thread_name_prefix: "pts-worker".into(),
        }
    }
}

impl SchedulerConfig {
    /// Default configuration (one worker per logical CPU, unbounded FIFO queue).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker count.
    #[must_use]
    pub const fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Bound the queue.
    #[must_use]
    pub const fn with_max_queue_depth(mut self, depth: usize) -> Self {
        self.max_queue_depth = Some(depth);
        self
    }

    /// Set the dequeue order.
    #[must_use]
    pub const fn with_queue_order(mut self, order: QueueOrder) -> Self {
        self.queue_order = order;
        self
    }

    /// Set the default drain mode.
    #[must_use]
    pub const fn with_drain_mode(mut self, mode: DrainMode) -> Self {
        self.drain_mode = mode;
        self
    }

    /// Set the abort join timeout.
    #[must_use]
    pub fn with_abort_join_timeout(mut self, timeout: Duration) -> Self {
        self.abort_join_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the worker thread stack size.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, bytes: usize) -> Self {
        self.thread_stack_size = Some(bytes);
        self
    }

    /// Set the worker thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Abort join timeout as a `Duration`.
    #[must_use]
    pub const fn abort_join_timeout(&self) -> Duration {
        Duration::from_millis(self.abort_join_timeout_ms)
    }

    /// Startup timeout as a `Duration`.
    #[must_use]
    pub const fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_count == 0 {
            return Err("worker_count must be greater than 0".into());
        }
        if self.max_queue_depth == Some(0) {
            return Err("max_queue_depth must be greater than 0".into());
        }
        if self.startup_timeout_ms == 0 {
            return Err("startup_timeout_ms must be greater than 0".into());
        }
        if self.thread_name_prefix.is_empty() {
            return Err("thread_name_prefix must not be empty".into());
        }
        Ok(())
    }

    /// Parse scheduler configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a message on malformed JSON or invalid values.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from `PTS_*` environment variables, loading a `.env`
    /// file first if one exists. Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns a message on unparsable or invalid values.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup using the `PTS_*` names.
    ///
    /// # Errors
    ///
    /// Returns a message on unparsable or invalid values.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        let mut cfg = Self::default();

        if let Some(v) = get("WORKER_COUNT") {
            cfg.worker_count = parse_field("WORKER_COUNT", &v)?;
        }
        if let Some(v) = get("MAX_QUEUE_DEPTH") {
            cfg.max_queue_depth = Some(parse_field("MAX_QUEUE_DEPTH", &v)?);
        }
        if let Some(v) = get("QUEUE_ORDER") {
            cfg.queue_order = v.parse()?;
        }
        if let Some(v) = get("DRAIN_MODE") {
            cfg.drain_mode = v.parse()?;
        }
        if let Some(v) = get("ABORT_JOIN_TIMEOUT_MS") {
            cfg.abort_join_timeout_ms = parse_field("ABORT_JOIN_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = get("STARTUP_TIMEOUT_MS") {
            cfg.startup_timeout_ms = parse_field("STARTUP_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = get("THREAD_STACK_SIZE") {
            cfg.thread_stack_size = Some(parse_field("THREAD_STACK_SIZE", &v)?);
        }
        if let Some(v) = get("THREAD_NAME_PREFIX") {
            cfg.thread_name_prefix = v;
        }

        cfg.validate()?;
        Ok(cfg)
    }
}

fn parse_field<T>(name: &str, value: &str) -> Result<T, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| format!("{ENV_PREFIX}{name}: {e}"))
}
