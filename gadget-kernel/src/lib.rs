//! Gadget discovery, tool construction, and lifecycle orchestration.
//!
//! The [`GadgetToolRegistry`] ties the pieces together: gadgets are
//! discovered, their descriptors resolved through the cache and the
//! [`InfoFetcher`], converted into tools by the [`GadgetToolBuilder`], and
//! published through a [`gadget_tools::ToolRegistry`]. In Kubernetes the
//! `ig_deploy` tool manages the backend and swaps placeholder tools for
//! functional ones once it is deployed.

#![warn(missing_docs, clippy::pedantic)]

mod action;
mod builder;
mod catalog;
mod cluster;
mod deploy;
mod discovery;
mod ephemeral;
mod error;
mod fetcher;
mod instances;
mod registry;
mod release;
mod template;

pub use action::{ACTION_ARG, Action, DeployAction, InstanceAction, UnknownAction, parse_action};
pub use builder::{DEFAULT_RUN_DURATION, GadgetToolBuilder, MAP_FETCH_INTERVAL_PARAM, tool_name};
pub use catalog::GadgetCatalog;
pub use cluster::{
    CHART_REPOSITORY, ClusterClient, DeploymentState, GADGET_POD_SELECTOR, RELEASE_NAME,
    RELEASE_NAMESPACE, chart_reference, detect_deployment,
};
pub use deploy::{DEPLOY_TOOL_NAME, DeployTool, Refresher};
pub use discovery::{BuiltinDiscoverer, DiscoveredGadget, Discoverer, discover_from_images};
pub use ephemeral::{NOT_DEPLOYED_MESSAGE, ephemeral_tools};
pub use error::{KernelError, KernelResult};
pub use fetcher::{FetchConfig, InfoFetcher};
pub use instances::{INSTANCE_TOOL_NAME, instance_tool};
pub use registry::{GadgetToolRegistry, GadgetToolRegistryBuilder};
pub use release::{
    GithubReleaseSource, LATEST_RELEASE_URL, LatestReleaseResolver, RELEASE_LOOKUP_TIMEOUT,
    ReleaseSource, VersionResolver, embedded_chart_version,
};
