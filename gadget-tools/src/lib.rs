//! Tool surface exposed to the protocol layer.
//!
//! A [`ToolDescriptor`] pairs protocol-facing metadata with a
//! [`ToolHandler`]. The [`ToolRegistry`] owns the authoritative catalog and
//! publishes immutable [`ToolSnapshot`]s to its subscribers whenever tools
//! are registered.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod handler;
mod hint;
mod registry;
mod schema;

pub use error::{ToolError, ToolResult};
pub use handler::{Arguments, ToolDescriptor, ToolHandler, ToolResponse};
pub use hint::ReadOnlyHint;
pub use registry::{ToolRegistry, ToolSnapshot};
pub use schema::InputSchema;
