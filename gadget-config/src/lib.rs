//! Server configuration read from flags and `IG_MCP_*` environment variables.

#![warn(missing_docs, clippy::pedantic)]

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use gadget_primitives::Environment;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::Level;

/// Transports accepted on the command line.
pub const TRANSPORTS: [&str; 3] = ["stdio", "sse", "streamable-http"];

/// Discoverers that can be selected by name. Other sources are supplied
/// programmatically when the server is assembled.
pub const DISCOVERERS: [&str; 1] = ["builtin"];

/// Result alias for configuration handling.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors produced while validating configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A setting holds an unusable value.
    #[error("invalid value for `{field}`: {reason}")]
    Invalid {
        /// Name of the offending setting.
        field: &'static str,
        /// Human-readable reason for rejection.
        reason: String,
    },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Settings of one server process.
#[derive(Parser, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[command(
    name = "ig-mcp-server",
    version,
    about = "Expose Inspektor Gadget gadgets as MCP tools"
)]
#[serde(default)]
pub struct ServerConfig {
    /// Environment the gadget backend runs in (kubernetes or linux).
    #[arg(long, env = "IG_MCP_ENVIRONMENT", default_value = "kubernetes")]
    pub environment: String,

    /// Address of the gadget daemon, required for the linux environment.
    #[arg(long, env = "IG_MCP_LINUX_REMOTE_ADDRESS")]
    pub linux_remote_address: Option<String>,

    /// Hide tools that modify the target system.
    #[arg(long, env = "IG_MCP_READ_ONLY")]
    pub read_only: bool,

    /// Comma separated gadget images to expose instead of the catalog.
    #[arg(long, env = "IG_MCP_GADGET_IMAGES", value_delimiter = ',')]
    pub gadget_images: Vec<String>,

    /// Discoverer listing gadgets when no images are given (builtin).
    #[arg(long, env = "IG_MCP_GADGET_DISCOVERER")]
    pub gadget_discoverer: Option<String>,

    /// Log level (debug, info, warn, error); `RUST_LOG` applies when unset.
    #[arg(long, env = "IG_MCP_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Directory holding the descriptor cache.
    #[arg(long, env = "IG_MCP_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Maximum concurrent descriptor fetches.
    #[arg(long, env = "IG_MCP_FETCH_CONCURRENCY", default_value_t = 10)]
    pub fetch_concurrency: usize,

    /// Attempts per descriptor fetch.
    #[arg(long, env = "IG_MCP_FETCH_ATTEMPTS", default_value_t = 3)]
    pub fetch_attempts: usize,

    /// Pause between descriptor fetch attempts, in milliseconds.
    #[arg(long, env = "IG_MCP_FETCH_RETRY_DELAY_MS", default_value_t = 2000)]
    pub fetch_retry_delay_ms: u64,

    /// Chart version deployed when a deploy call does not name one.
    #[arg(long, env = "IG_MCP_CHART_VERSION")]
    pub chart_version: Option<String>,

    /// Protocol transport (stdio, sse, streamable-http).
    #[arg(long, env = "IG_MCP_TRANSPORT", default_value = "stdio")]
    pub transport: String,

    /// Host the network transports bind to.
    #[arg(long, env = "IG_MCP_TRANSPORT_HOST", default_value = "localhost")]
    pub transport_host: String,

    /// Port the network transports bind to.
    #[arg(long, env = "IG_MCP_TRANSPORT_PORT", default_value_t = 8080)]
    pub transport_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default().to_string(),
            linux_remote_address: None,
            read_only: false,
            gadget_images: Vec::new(),
            gadget_discoverer: None,
            log_level: None,
            cache_dir: None,
            fetch_concurrency: 10,
            fetch_attempts: 3,
            fetch_retry_delay_ms: 2000,
            chart_version: None,
            transport: TRANSPORTS[0].to_owned(),
            transport_host: "localhost".to_owned(),
            transport_port: 8080,
        }
    }
}

impl ServerConfig {
    /// Checks every setting and the combinations between them.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first rejected setting.
    pub fn validate(&self) -> ConfigResult<()> {
        let environment = self.environment()?;
        if environment == Environment::Linux && self.remote_address().is_none() {
            return Err(ConfigError::invalid(
                "linux_remote_address",
                "required for the linux environment",
            ));
        }
        self.gadget_discoverer()?;
        self.log_level()?;
        self.fetch_concurrency()?;
        self.fetch_attempts()?;
        if !TRANSPORTS.contains(&self.transport.as_str()) {
            return Err(ConfigError::invalid(
                "transport",
                format!("must be one of: {}", TRANSPORTS.join(", ")),
            ));
        }
        if self.transport != TRANSPORTS[0] && self.transport_host.trim().is_empty() {
            return Err(ConfigError::invalid("transport_host", "must not be empty"));
        }
        Ok(())
    }

    /// Returns the selected environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an unknown environment name.
    pub fn environment(&self) -> ConfigResult<Environment> {
        self.environment
            .trim()
            .to_ascii_lowercase()
            .parse()
            .map_err(|_| ConfigError::invalid("environment", "must be one of: kubernetes, linux"))
    }

    /// Returns the trimmed remote address, if any.
    #[must_use]
    pub fn remote_address(&self) -> Option<&str> {
        self.linux_remote_address
            .as_deref()
            .map(str::trim)
            .filter(|address| !address.is_empty())
    }

    /// Returns the explicit images with blank entries removed.
    #[must_use]
    pub fn images(&self) -> Vec<String> {
        self.gadget_images
            .iter()
            .map(|image| image.trim())
            .filter(|image| !image.is_empty())
            .map(str::to_owned)
            .collect()
    }

    /// Returns the selected discoverer name, lowercased.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a name outside [`DISCOVERERS`].
    pub fn gadget_discoverer(&self) -> ConfigResult<Option<&'static str>> {
        let Some(name) = self
            .gadget_discoverer
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
        else {
            return Ok(None);
        };
        DISCOVERERS
            .iter()
            .find(|known| known.eq_ignore_ascii_case(name))
            .copied()
            .map(Some)
            .ok_or_else(|| {
                ConfigError::invalid(
                    "gadget_discoverer",
                    format!("must be one of: {}", DISCOVERERS.join(", ")),
                )
            })
    }

    /// Returns the explicit log level.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an unknown level name.
    pub fn log_level(&self) -> ConfigResult<Option<Level>> {
        self.log_level
            .as_deref()
            .filter(|level| !level.trim().is_empty())
            .map(gadget_telemetry::parse_log_level)
            .transpose()
            .map_err(|err| ConfigError::invalid("log_level", err.to_string()))
    }

    /// Returns the fetch concurrency limit.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the limit is zero.
    pub fn fetch_concurrency(&self) -> ConfigResult<NonZeroUsize> {
        NonZeroUsize::new(self.fetch_concurrency)
            .ok_or_else(|| ConfigError::invalid("fetch_concurrency", "must be greater than zero"))
    }

    /// Returns the number of fetch attempts.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the count is zero.
    pub fn fetch_attempts(&self) -> ConfigResult<NonZeroUsize> {
        NonZeroUsize::new(self.fetch_attempts)
            .ok_or_else(|| ConfigError::invalid("fetch_attempts", "must be greater than zero"))
    }

    /// Returns the pause between fetch attempts.
    #[must_use]
    pub fn fetch_retry_delay(&self) -> Duration {
        Duration::from_millis(self.fetch_retry_delay_ms)
    }

    /// Returns the pinned chart version, if any.
    #[must_use]
    pub fn chart_version(&self) -> Option<&str> {
        self.chart_version
            .as_deref()
            .map(str::trim)
            .filter(|version| !version.is_empty())
    }
}
