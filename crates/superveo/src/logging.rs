//! Diagnostic logging setup for hosts embedding the library.
//!
//! Library code logs through both `log` and `tracing`; `init_logging`
//! installs one `tracing-subscriber` pipeline and bridges `log` records into
//! it.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("Logging is already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Builds the filter from `RUST_LOG`, falling back to `default_filter`.
pub fn env_filter(default_filter: &str) -> Result<EnvFilter, LoggingError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(default_filter).map_err(|e| LoggingError::InvalidFilter {
            filter: default_filter.to_string(),
            reason: e.to_string(),
        }),
    }
}

/// Installs the global subscriber. A second call returns an error.
pub fn init_logging(default_filter: &str) -> Result<(), LoggingError> {
    init_logging_with_format(default_filter, LogFormat::Text)
}

pub fn init_logging_with_format(default_filter: &str, format: LogFormat) -> Result<(), LoggingError> {
    let filter = env_filter(default_filter)?;

    tracing_log::LogTracer::init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    let result = match format {
        LogFormat::Text => tracing::subscriber::set_global_default(
            Registry::default()
                .with(filter)
                .with(fmt::layer().with_target(true)),
        ),
        LogFormat::Json => tracing::subscriber::set_global_default(
            Registry::default()
                .with(filter)
                .with(fmt::layer().json().with_current_span(true)),
        ),
    };
    result.map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    log::debug!("Logging initialized");
    Ok(())
}
