//! Shared error definitions for gadget primitives.

use thiserror::Error;

/// Result alias used throughout the gadget primitives.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while manipulating gadget primitive types.
#[derive(Debug, Error)]
pub enum Error {
    /// The image reference could not be parsed.
    #[error("invalid gadget reference `{reference}`: {reason}")]
    InvalidGadgetRef {
        /// The offending reference string.
        reference: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// The instance identifier was empty or malformed.
    #[error("invalid instance id `{id}`")]
    InvalidInstanceId {
        /// The offending identifier string.
        id: String,
    },

    /// Embedded gadget metadata could not be decoded.
    #[error("unmarshalling gadget metadata: {source}")]
    Metadata {
        /// Source decoding error from the YAML parser.
        #[from]
        source: serde_yaml::Error,
    },

    /// The environment name is not one of the supported environments.
    #[error("unsupported gadget manager environment: {name}")]
    UnsupportedEnvironment {
        /// The offending environment name.
        name: String,
    },

    /// Descriptor definition failed validation.
    #[error("invalid gadget descriptor: {reason}")]
    InvalidDescriptor {
        /// Human-readable reason for rejection.
        reason: String,
    },
}
