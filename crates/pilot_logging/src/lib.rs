#![deny(missing_docs)]
//! Shared logging utilities for the formpilot workspace.
//!
//! This crate provides the `pilot_*` logging macros used across the codebase,
//! a thread-local tab context so log lines can name the tab they concern, and
//! a minimal test initializer for the global logger.

use std::cell::Cell;

thread_local! {
    /// Thread-local storage for the tab currently being worked on.
    static ACTIVE_TAB: Cell<Option<u32>> = const { Cell::new(None) };
}

/// Sets the tab context for the current thread.
/// The controller runtime calls this before dispatching work for a tab.
pub fn set_active_tab(tab_id: u32) {
    ACTIVE_TAB.with(|v| v.set(Some(tab_id)));
}

/// Clears the tab context for the current thread.
pub fn clear_active_tab() {
    ACTIVE_TAB.with(|v| v.set(None));
}

/// Returns the tab context for the current thread, if one is set.
pub fn active_tab() -> Option<u32> {
    ACTIVE_TAB.with(|v| v.get())
}

/// Formats the current tab context as a log prefix, e.g. `[tab 3] `.
/// Returns an empty string when no tab context is set.
pub fn tab_prefix() -> String {
    match active_tab() {
        Some(tab_id) => format!("[tab {tab_id}] "),
        None => String::new(),
    }
}

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! pilot_trace {
    ($($arg:tt)*) => {{
        log::trace!("{}{}", $crate::tab_prefix(), format_args!($($arg)*));
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! pilot_info {
    ($($arg:tt)*) => {{
        log::info!("{}{}", $crate::tab_prefix(), format_args!($($arg)*));
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! pilot_debug {
    ($($arg:tt)*) => {{
        log::debug!("{}{}", $crate::tab_prefix(), format_args!($($arg)*));
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! pilot_warn {
    ($($arg:tt)*) => {{
        log::warn!("{}{}", $crate::tab_prefix(), format_args!($($arg)*));
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! pilot_error {
    ($($arg:tt)*) => {{
        log::error!("{}{}", $crate::tab_prefix(), format_args!($($arg)*));
    }};
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
