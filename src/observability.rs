//! Logging infrastructure for tripbench.
//!
//! All events go through `tracing` with target "tripbench" and carry an
//! `event` field for filtering.
//!
//! The library never installs a global subscriber. The `tripbench` binary
//! configures `tracing_subscriber`; embedders bring their own.
//!
//! ## Conventions
//!
//! - `event`: snake_case event name (required)
//! - `component`: subsystem (e.g., "ingest", "bench", "store")
//! - Use `%` for Display, `?` for Debug formatting

/// Target for all tripbench log events.
pub(crate) const TRIPBENCH_TARGET: &str = "tripbench";

/// Macro for info-level log events.
///
/// # Example
/// ```ignore
/// log_info!(
///     component = "ingest",
///     event = "batch_flushed",
///     rows = accepted,
///     seconds = elapsed,
/// );
/// ```
macro_rules! log_info {
    ($($field:tt)*) => {
        ::tracing::info!(target: $crate::observability::TRIPBENCH_TARGET, $($field)*)
    };
}

/// Macro for debug-level log events.
macro_rules! log_debug {
    ($($field:tt)*) => {
        ::tracing::debug!(target: $crate::observability::TRIPBENCH_TARGET, $($field)*)
    };
}

/// Macro for warn-level log events.
macro_rules! log_warn {
    ($($field:tt)*) => {
        ::tracing::warn!(target: $crate::observability::TRIPBENCH_TARGET, $($field)*)
    };
}

/// Macro for error-level log events.
macro_rules! log_error {
    ($($field:tt)*) => {
        ::tracing::error!(target: $crate::observability::TRIPBENCH_TARGET, $($field)*)
    };
}

pub(crate) use log_debug;
pub(crate) use log_error;
pub(crate) use log_info;
pub(crate) use log_warn;
