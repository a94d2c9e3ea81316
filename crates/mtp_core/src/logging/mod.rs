//! Logging infrastructure for Multitrack Player.
//!
//! This module provides:
//! - Application-wide `tracing` setup (stderr, optionally a rolling file)
//! - Per-load loggers that record tool commands and keep a tail of tool
//!   output for diagnosing failed extractions
//!
//! # Example
//!
//! ```no_run
//! use mtp_core::logging::{LoadLogger, LogConfig};
//!
//! let logger = LoadLogger::new("movie", "/path/to/logs", LogConfig::default()).unwrap();
//! logger.phase("Extract");
//! logger.command("ffmpeg -i movie.mkv ...");
//! logger.success("Extracted 3 tracks");
//! ```

mod load_logger;
mod types;

pub use load_logger::LoadLogger;
pub use types::{LogConfig, LogLevel, MessagePrefix};

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the global tracing subscriber, logging to stderr.
///
/// Respects `RUST_LOG` and falls back to `default_level`.
/// Should be called once at application startup.
pub fn init_tracing(default_level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_to_filter_str(default_level)));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(filter)
        .init();
}

/// Initialize tracing to stderr plus a daily rolling file in `logs_dir`.
///
/// The returned guard must be held for the lifetime of the program so the
/// background writer flushes on exit.
pub fn init_tracing_with_file(default_level: LogLevel, logs_dir: &Path) -> WorkerGuard {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_to_filter_str(default_level)));

    let file_appender = tracing_appender::rolling::daily(logs_dir, "multitrack-player.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .with(filter)
        .init();

    guard
}

/// Initialize tracing for tests (only logs warnings and above).
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

/// Convert LogLevel to filter string.
fn level_to_filter_str(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Trace => "trace",
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_to_filter_works() {
        assert_eq!(level_to_filter_str(LogLevel::Debug), "debug");
        assert_eq!(level_to_filter_str(LogLevel::Info), "info");
    }

    #[test]
    fn level_parsing() {
        assert_eq!(LogLevel::parse("WARN"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("loud"), None);
    }
}
