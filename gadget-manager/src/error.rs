//! Error types for gadget management.

use thiserror::Error;

use crate::runtime::RuntimeError;

/// Result alias for gadget manager operations.
pub type GadgetResult<T> = Result<T, GadgetError>;

/// Errors produced by a [`GadgetManager`](crate::GadgetManager).
#[derive(Debug, Error)]
pub enum GadgetError {
    /// The manager configuration was rejected at construction time.
    #[error("invalid gadget manager configuration: {reason}")]
    Configuration {
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// The runtime reported a failure; `operation` names what was attempted.
    #[error("{operation}: {source}")]
    Backend {
        /// Operation being performed, e.g. `running gadget`.
        operation: &'static str,
        /// Underlying runtime error.
        #[source]
        source: RuntimeError,
    },

    /// The manager was shut down while the operation was in flight.
    #[error("{operation}: cancelled by shutdown")]
    Cancelled {
        /// Operation being performed.
        operation: &'static str,
    },

    /// Shared primitive validation failed.
    #[error(transparent)]
    Primitive(#[from] gadget_primitives::Error),
}

impl GadgetError {
    /// Wraps a runtime error with operation context.
    #[must_use]
    pub fn backend(operation: &'static str, source: RuntimeError) -> Self {
        Self::Backend { operation, source }
    }

    /// Convenience constructor for configuration failures.
    #[must_use]
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }
}
