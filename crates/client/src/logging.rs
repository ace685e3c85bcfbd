//! Logging setup and the crate's logging macros.
//!
//! All logs go through `tracing` under the `tracker_client` target. The
//! macros keep call sites short and let embedders swap the subscriber.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Install a fmt subscriber. `RUST_LOG` wins over `default_filter`.
///
/// Safe to call more than once; only the first call has an effect, and a
/// subscriber installed by the host application is left alone.
pub fn init(default_filter: &str) {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    });
}

pub fn log_info_impl(msg: &str) {
    tracing::info!(target: "tracker_client", "{}", msg);
}

pub fn log_error_impl(msg: &str) {
    tracing::error!(target: "tracker_client", "{}", msg);
}

pub fn log_warn_impl(msg: &str) {
    tracing::warn!(target: "tracker_client", "{}", msg);
}

pub fn log_debug_impl(msg: &str) {
    tracing::debug!(target: "tracker_client", "{}", msg);
}

/// Log an info message
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logging::log_info_impl(&format!($($arg)*))
    };
}

/// Log an error message
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::logging::log_error_impl(&format!($($arg)*))
    };
}

/// Log a warning message
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logging::log_warn_impl(&format!($($arg)*))
    };
}

/// Log a debug message
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::logging::log_debug_impl(&format!($($arg)*))
    };
}
