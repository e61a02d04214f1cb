//! Foreign-facing surface: status codes and models, the process-wide registry,
//! and the C ABI.

pub mod api;
pub mod c_api;
pub mod global;

pub use api::{task_status_code, SchedulerSnapshot, StatusCode, TaskStatusResponse};
pub use global::{default_handle, init_default, registry, shutdown_default};
