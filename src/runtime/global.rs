//! Process-wide scheduler registry and optional default scheduler.
//!
//! The C ABI and any caller without its own [`HandleRegistry`] share the
//! registry returned by [`registry`]. The default scheduler is an ordinary
//! handle in that registry; it is created and destroyed explicitly, never
//! lazily.

use std::sync::OnceLock;

use parking_lot::{const_mutex, Mutex};
use tracing::info;

use crate::config::{DrainMode, SchedulerConfig};
use crate::core::{Handle, HandleRegistry, SchedulerError, ShutdownReport};

static REGISTRY: OnceLock<HandleRegistry<()>> = OnceLock::new();
static DEFAULT_HANDLE: Mutex<Option<Handle>> = const_mutex(None);

/// The process-wide registry.
pub fn registry() -> &'static HandleRegistry<()> {
    REGISTRY.get_or_init(HandleRegistry::new)
}

/// Create the default scheduler.
///
/// # Errors
///
/// - `SchedulerError::AlreadyInitialized` if a default scheduler exists
/// - any error of [`HandleRegistry::create_with`]
pub fn init_default(config: SchedulerConfig) -> Result<Handle, SchedulerError> {
    let mut default = DEFAULT_HANDLE.lock();
    if default.is_some() {
        return Err(SchedulerError::AlreadyInitialized);
    }
    let handle = registry().create_with(config)?;
    *default = Some(handle);
    info!(handle = %handle, "Default scheduler initialized");
    Ok(handle)
}

/// Handle of the default scheduler.
///
/// # Errors
///
/// `SchedulerError::NotInitialized` if [`init_default`] has not succeeded.
pub fn default_handle() -> Result<Handle, SchedulerError> {
    (*DEFAULT_HANDLE.lock()).ok_or(SchedulerError::NotInitialized)
}

/// Destroy the default scheduler. A new one may be created afterwards.
///
/// # Errors
///
/// - `SchedulerError::NotInitialized` if there is no default scheduler
/// - any error of [`HandleRegistry::destroy_with`]
pub fn shutdown_default(mode: DrainMode) -> Result<ShutdownReport, SchedulerError> {
    let handle = DEFAULT_HANDLE.lock().take().ok_or(SchedulerError::NotInitialized)?;
    let report = registry().destroy_with(handle, mode);
    if matches!(report, Err(SchedulerError::InvalidArgument(_))) {
        // Refused from one of its own workers; keep it as the default
        *DEFAULT_HANDLE.lock() = Some(handle);
    }
    report
}
