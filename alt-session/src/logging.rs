//! Logging setup for the collector
//!
//! Operator diagnostics (connected devices, dropped devices, context
//! switches) go through `tracing`. This module installs a subscriber
//! suited to how the collector is being run.

use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Logging mode for different use cases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    /// No subscriber installed; all diagnostics are dropped
    Silent,
    /// Compact stderr output for operators
    Development,
    /// Verbose diagnostics with thread ids and source locations
    Debug,
}

/// Logging configuration error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("Invalid log filter '{filter}': {message}")]
    InvalidFilter { filter: String, message: String },
}

/// Initialize logging with the specified mode
///
/// Call once, before the session is created.
///
/// # Environment Variables
///
/// - `ALT_LOG_LEVEL`: Override log level or filter (e.g. `debug`, `alt_session=trace`)
/// - `RUST_LOG`: Used when `ALT_LOG_LEVEL` is not set
pub fn init_logging(mode: LoggingMode) -> Result<(), LoggingError> {
    init_logging_with_default(mode, None)
}

/// Like [`init_logging`], with an explicit default level
///
/// `default_level` replaces the mode's default but is still overridden
/// by `ALT_LOG_LEVEL` / `RUST_LOG`.
pub fn init_logging_with_default(mode: LoggingMode, default_level: Option<&str>) -> Result<(), LoggingError> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    match mode {
        LoggingMode::Silent => Ok(()),
        LoggingMode::Development => {
            let filter = create_env_filter(default_level.unwrap_or("info"))?;

            Registry::default()
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(false)
                        .with_thread_ids(false)
                        .with_file(false)
                        .with_line_number(false)
                        .compact(),
                )
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
        LoggingMode::Debug => {
            let filter = create_env_filter(default_level.unwrap_or("debug"))?;

            Registry::default()
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .pretty()
                        .with_thread_ids(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
    }
}

/// Initialize logging from the `ALT_LOG_MODE` environment variable
///
/// - "silent" -> LoggingMode::Silent
/// - "debug" -> LoggingMode::Debug
/// - anything else -> LoggingMode::Development
pub fn init_logging_from_env() -> Result<(), LoggingError> {
    init_logging(mode_from_env())
}

/// Logging mode selected by `ALT_LOG_MODE`
pub fn mode_from_env() -> LoggingMode {
    parse_mode(std::env::var("ALT_LOG_MODE").ok().as_deref())
}

fn parse_mode(value: Option<&str>) -> LoggingMode {
    match value.map(str::to_ascii_lowercase).as_deref() {
        Some("silent") => LoggingMode::Silent,
        Some("debug") => LoggingMode::Debug,
        _ => LoggingMode::Development,
    }
}

/// Create an environment filter with fallback to default level
fn create_env_filter(default_level: &str) -> Result<EnvFilter, LoggingError> {
    let directives = std::env::var("ALT_LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| default_level.to_string());

    EnvFilter::try_new(&directives).map_err(|e| LoggingError::InvalidFilter {
        filter: directives.clone(),
        message: e.to_string(),
    })
}
