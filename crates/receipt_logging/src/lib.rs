#![deny(missing_docs)]
//! Shared logging utilities for the receipt workspace.
//!
//! This crate provides the `receipt_*` logging macros used by the engine and
//! the CLI, and a minimal test initializer for the global logger.

/// Log target used by every `receipt_*` macro. The CLI filters on it.
pub const LOG_TARGET: &str = "receipt";

/// Logs a trace-level message under [`LOG_TARGET`].
#[macro_export]
macro_rules! receipt_trace {
    ($($arg:tt)*) => {{
        log::trace!(target: $crate::LOG_TARGET, $($arg)*);
    }};
}

/// Logs an info-level message under [`LOG_TARGET`].
#[macro_export]
macro_rules! receipt_info {
    ($($arg:tt)*) => {{
        log::info!(target: $crate::LOG_TARGET, $($arg)*);
    }};
}

/// Logs a debug-level message under [`LOG_TARGET`].
#[macro_export]
macro_rules! receipt_debug {
    ($($arg:tt)*) => {{
        log::debug!(target: $crate::LOG_TARGET, $($arg)*);
    }};
}

/// Logs a warn-level message under [`LOG_TARGET`].
#[macro_export]
macro_rules! receipt_warn {
    ($($arg:tt)*) => {{
        log::warn!(target: $crate::LOG_TARGET, $($arg)*);
    }};
}

/// Logs an error-level message under [`LOG_TARGET`].
#[macro_export]
macro_rules! receipt_error {
    ($($arg:tt)*) => {{
        log::error!(target: $crate::LOG_TARGET, $($arg)*);
    }};
}

/// Returns the default level for the current build profile.
///
/// Debug builds log at `Debug`, release builds at `Info`.
pub fn default_level() -> log::LevelFilter {
    if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    }
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        default_level(),
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
