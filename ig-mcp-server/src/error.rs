//! Errors raised while assembling a server.

use gadget_config::ConfigError;
use gadget_kernel::KernelError;
use gadget_manager::GadgetError;
use thiserror::Error;

/// Result alias for server assembly.
pub type ServerResult<T> = Result<T, ServerError>;

/// Fatal errors raised while building or preparing a server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The gadget manager could not be created.
    #[error("creating gadget manager: {0}")]
    Manager(#[from] GadgetError),

    /// The tool registry could not be built or prepared.
    #[error("preparing tool registry: {0}")]
    Registry(#[from] KernelError),
}
