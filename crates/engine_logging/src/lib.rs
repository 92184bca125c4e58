#![deny(missing_docs)]
//! Shared logging utilities for the relay workspace.
//!
//! This crate provides the `engine_*` logging macros used across the codebase
//! and a minimal test initializer for the global logger. Every message is
//! prefixed with the lane tag of the emitting thread, so interleaved output
//! from the download and upload workers stays readable.

use std::cell::RefCell;

thread_local! {
    /// Thread-local tag naming the lane this thread works for.
    static LANE_TAG: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Sets the lane tag for the current thread.
/// Lane workers call this once, right after they are spawned.
pub fn set_lane_tag(tag: impl Into<String>) {
    let tag = tag.into();
    LANE_TAG.with(|v| *v.borrow_mut() = Some(tag));
}

/// Clears the lane tag for the current thread.
pub fn clear_lane_tag() {
    LANE_TAG.with(|v| *v.borrow_mut() = None);
}

/// Retrieves the lane tag for the current thread.
/// Returns `None` if no tag has been set.
pub fn lane_tag() -> Option<String> {
    LANE_TAG.with(|v| v.borrow().clone())
}

/// Renders the message prefix for the current thread: `"[download] "` or empty.
#[doc(hidden)]
pub fn lane_prefix() -> String {
    LANE_TAG.with(|v| match v.borrow().as_deref() {
        Some(tag) => format!("[{tag}] "),
        None => String::new(),
    })
}

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! engine_trace {
    ($($arg:tt)*) => {{
        log::trace!("{}{}", $crate::lane_prefix(), format_args!($($arg)*));
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! engine_info {
    ($($arg:tt)*) => {{
        log::info!("{}{}", $crate::lane_prefix(), format_args!($($arg)*));
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! engine_debug {
    ($($arg:tt)*) => {{
        log::debug!("{}{}", $crate::lane_prefix(), format_args!($($arg)*));
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! engine_warn {
    ($($arg:tt)*) => {{
        log::warn!("{}{}", $crate::lane_prefix(), format_args!($($arg)*));
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! engine_error {
    ($($arg:tt)*) => {{
        log::error!("{}{}", $crate::lane_prefix(), format_args!($($arg)*));
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lane_tag_is_per_thread() {
        set_lane_tag("download");
        assert_eq!(lane_tag().as_deref(), Some("download"));
        assert_eq!(lane_prefix(), "[download] ");

        let other = std::thread::spawn(lane_tag).join().unwrap();
        assert_eq!(other, None);

        clear_lane_tag();
        assert_eq!(lane_prefix(), "");
    }
}
