//! Inspektor Gadget tools for MCP servers.
//!
//! This facade bundles the workspace crates behind feature flags. With the
//! `server` feature it also provides [`Server`], which assembles the gadget
//! manager, descriptor cache and tool registry from a [`config::ServerConfig`]
//! and serves the published catalog to a protocol layer.

#![warn(missing_docs, clippy::pedantic)]

/// Shared primitives.
pub use gadget_primitives as primitives;

/// Gadget execution and result governing (enabled by `manager` feature).
#[cfg(feature = "manager")]
pub use gadget_manager as manager;

/// Descriptor cache (enabled by `cache` feature).
#[cfg(feature = "cache")]
pub use gadget_cache as cache;

/// Tool descriptors and registry (enabled by `tools` feature).
#[cfg(feature = "tools")]
pub use gadget_tools as tools;

/// Discovery, tool building and lifecycle tools (enabled by `kernel` feature).
#[cfg(feature = "kernel")]
pub use gadget_kernel as kernel;

/// Configuration (enabled by `config` feature).
#[cfg(feature = "config")]
pub use gadget_config as config;

/// Tracing setup (enabled by `telemetry` feature).
#[cfg(feature = "telemetry")]
pub use gadget_telemetry as telemetry;

#[cfg(feature = "server")]
mod error;
#[cfg(feature = "server")]
mod server;

#[cfg(feature = "server")]
pub use error::{ServerError, ServerResult};
#[cfg(feature = "server")]
pub use server::{Server, ServerBuilder};
