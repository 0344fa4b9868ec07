//! Tracing setup shared by the server binaries.
//!
//! Logs go to stderr; stdout is reserved for a stdio protocol transport.

#![warn(missing_docs, clippy::pedantic)]

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Result alias for telemetry setup.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Errors produced while configuring tracing.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The log level name is not recognised.
    #[error("invalid log level `{level}`, must be one of: debug, info, warn, error")]
    InvalidLevel {
        /// Rejected input.
        level: String,
    },

    /// A global subscriber was already installed.
    #[error("installing tracing subscriber: {reason}")]
    Install {
        /// Human-readable reason for the failure.
        reason: String,
    },
}

/// Parses a log level name, ignoring case.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidLevel`] for anything other than
/// `debug`, `info`, `warn` or `error`.
pub fn parse_log_level(level: &str) -> TelemetryResult<Level> {
    match level.trim().to_ascii_lowercase().as_str() {
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(TelemetryError::InvalidLevel {
            level: level.to_owned(),
        }),
    }
}

/// Builds the filter: an explicit level wins over `RUST_LOG`, which wins
/// over `info`.
#[must_use]
pub fn env_filter(level: Option<Level>) -> EnvFilter {
    match level {
        Some(level) => EnvFilter::new(level.as_str().to_ascii_lowercase()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    }
}

/// Installs the global `fmt` subscriber writing to stderr.
///
/// # Errors
///
/// Returns [`TelemetryError::Install`] when a subscriber is already set.
pub fn init_tracing(level: Option<Level>) -> TelemetryResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|err| TelemetryError::Install {
            reason: err.to_string(),
        })
}
