//! Core shared types for exposing gadgets as tools.

#![warn(missing_docs, clippy::pedantic)]

mod descriptor;
mod environment;
mod error;
mod ids;
mod reference;

/// Remote-supplied gadget schema and its building blocks.
pub use descriptor::{
    DataSourceDescriptor, FieldDescriptor, GadgetDescriptor, GadgetDescriptorBuilder,
    GadgetMetadata, ParamDescriptor, ParamMap, DESCRIPTION_ANNOTATION, VALUE_ONE_OF_ANNOTATION,
};
/// Target environment of the gadget backend.
pub use environment::Environment;
/// Error type and result alias shared across the workspace.
pub use error::{Error, Result};
/// Identifier of a detached gadget execution.
pub use ids::InstanceId;
/// Container-style image reference naming a gadget.
pub use reference::GadgetRef;
