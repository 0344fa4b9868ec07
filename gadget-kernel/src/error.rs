//! Error types for the gadget kernel.

use thiserror::Error;

/// Result alias for kernel operations.
pub type KernelResult<T> = Result<T, KernelError>;

/// Errors produced while discovering gadgets and building tools.
#[derive(Debug, Error)]
pub enum KernelError {
    /// A discoverer could not list gadgets.
    #[error("listing gadgets from {source_name} discoverer: {reason}")]
    Discovery {
        /// Discoverer that failed.
        source_name: &'static str,
        /// Human-readable reason for the failure.
        reason: String,
    },

    /// A descriptor could not be turned into a tool.
    #[error("building tool for `{image}`: {reason}")]
    ToolBuild {
        /// Image the tool was built for.
        image: String,
        /// Human-readable reason for the failure.
        reason: String,
    },

    /// A template variable had no value.
    #[error("missing template variable: {name}")]
    MissingVariable {
        /// Name of the missing variable.
        name: String,
    },

    /// Gadget pods were found in more than one namespace.
    #[error("multiple namespaces found for Inspektor Gadget pods: {namespaces:?}")]
    AmbiguousDeployment {
        /// Namespaces hosting gadget pods.
        namespaces: Vec<String>,
    },

    /// The cluster API reported a failure.
    #[error("cluster request failed: {reason}")]
    Cluster {
        /// Human-readable reason for the failure.
        reason: String,
    },

    /// The latest published release could not be determined.
    #[error("resolving latest release: {reason}")]
    Release {
        /// Human-readable reason for the failure.
        reason: String,
    },

    /// The registry was assembled with missing or conflicting parts.
    #[error("invalid registry configuration: {reason}")]
    Configuration {
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Shared primitive validation failed.
    #[error(transparent)]
    Primitive(#[from] gadget_primitives::Error),
}

impl KernelError {
    /// Convenience constructor for cluster failures.
    #[must_use]
    pub fn cluster(reason: impl Into<String>) -> Self {
        Self::Cluster {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for configuration failures.
    #[must_use]
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for release lookup failures.
    #[must_use]
    pub fn release(reason: impl Into<String>) -> Self {
        Self::Release {
            reason: reason.into(),
        }
    }
}
