//! Builder to construct schedulers from configuration.

use std::sync::Arc;

use crate::config::SchedulerConfig;
use crate::core::{AuditSink, Handle, HandleRegistry, Scheduler, SchedulerError};

/// Assemble a [`Scheduler`] from a configuration and an optional audit sink.
pub struct SchedulerBuilder<R>
where
    R: Send + 'static,
{
    config: SchedulerConfig,
    audit: Option<Arc<dyn AuditSink>>,
    _result: std::marker::PhantomData<fn() -> R>,
}

impl<R> SchedulerBuilder<R>
where
    R: Send + 'static,
{
    /// Start from `config`.
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            audit: None,
            _result: std::marker::PhantomData,
        }
    }

    /// Record task lifecycle events into `sink`.
    #[must_use]
    pub fn with_audit(self, sink: impl AuditSink + 'static) -> Self {
        self.with_audit_arc(Arc::new(sink))
    }

    /// Record task lifecycle events into a shared sink.
    #[must_use]
    pub fn with_audit_arc(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    /// Configuration the scheduler will be started with.
    #[must_use]
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Validate the configuration and start the scheduler.
    ///
    /// # Errors
    ///
    /// Same as [`Scheduler::start`].
    pub fn build(self) -> Result<Scheduler<R>, SchedulerError> {
        Scheduler::start(self.config, self.audit)
    }

    /// Start the scheduler and register it, returning its handle.
    ///
    /// # Errors
    ///
    /// Same as [`HandleRegistry::register`].
    pub fn register(self, registry: &HandleRegistry<R>) -> Result<Handle, SchedulerError> {
        registry.register(self)
    }
}
