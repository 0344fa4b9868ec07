//! Sources of the gadget catalog.

use async_trait::async_trait;
use gadget_primitives::GadgetRef;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{KernelError, KernelResult};

static BUILTIN_CATALOG: &str = include_str!("../data/gadgets.json");

/// A gadget offered by a discoverer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscoveredGadget {
    /// Image reference of the gadget.
    pub image: GadgetRef,
    /// Short description, empty when unknown.
    pub description: String,
}

impl DiscoveredGadget {
    /// Creates an entry without description.
    #[must_use]
    pub fn new(image: GadgetRef) -> Self {
        Self {
            image,
            description: String::new(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Pluggable source of available gadgets.
#[async_trait]
pub trait Discoverer: Send + Sync {
    /// Lists the gadgets this source offers, in order.
    async fn list_gadgets(&self) -> KernelResult<Vec<DiscoveredGadget>>;
}

/// Turns an explicit image list into discovered gadgets.
///
/// Entries are trimmed; blank and malformed entries are skipped.
#[must_use]
pub fn discover_from_images<S: AsRef<str>>(images: &[S]) -> Vec<DiscoveredGadget> {
    images
        .iter()
        .map(AsRef::as_ref)
        .filter(|image| !image.trim().is_empty())
        .filter_map(|image| match GadgetRef::new(image) {
            Ok(image) => Some(DiscoveredGadget::new(image)),
            Err(err) => {
                warn!(image, error = %err, "skipping invalid gadget image");
                None
            }
        })
        .collect()
}

#[derive(Deserialize)]
struct BuiltinPackages {
    packages: Vec<BuiltinPackage>,
}

#[derive(Deserialize)]
struct BuiltinPackage {
    #[serde(default)]
    normalized_name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    container_image: String,
}

/// Discoverer backed by the catalog compiled into the binary.
#[derive(Clone, Copy, Debug, Default)]
pub struct BuiltinDiscoverer;

impl BuiltinDiscoverer {
    /// Name used in logs and errors.
    pub const SOURCE: &'static str = "builtin";

    fn parse(data: &str) -> KernelResult<Vec<DiscoveredGadget>> {
        let packages: BuiltinPackages =
            serde_json::from_str(data).map_err(|err| KernelError::Discovery {
                source_name: Self::SOURCE,
                reason: format!("failed to parse embedded gadgets JSON: {err}"),
            })?;

        let mut gadgets = Vec::with_capacity(packages.packages.len());
        for package in packages.packages {
            if package.container_image.trim().is_empty() {
                warn!(name = %package.normalized_name, "skipping gadget with empty container image");
                continue;
            }
            let image = GadgetRef::new(package.container_image)?;
            gadgets.push(DiscoveredGadget::new(image).with_description(package.description));
        }
        debug!(count = gadgets.len(), "loaded gadgets from embedded data");
        Ok(gadgets)
    }
}

#[async_trait]
impl Discoverer for BuiltinDiscoverer {
    async fn list_gadgets(&self) -> KernelResult<Vec<DiscoveredGadget>> {
        Self::parse(BUILTIN_CATALOG)
    }
}
