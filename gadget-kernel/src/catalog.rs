//! Descriptor pipeline: cache lookup, concurrent fetch, tool build, persist.

use std::sync::Arc;

use gadget_cache::{DescriptorMap, MetadataStore};
use gadget_manager::GadgetManager;
use gadget_primitives::Environment;
use gadget_tools::ToolDescriptor;
use tracing::{debug, info, warn};

use crate::builder::GadgetToolBuilder;
use crate::discovery::DiscoveredGadget;
use crate::fetcher::{FetchConfig, InfoFetcher};

/// Produces functional gadget tools for a set of discovered gadgets.
pub struct GadgetCatalog {
    manager: Arc<dyn GadgetManager>,
    store: Arc<dyn MetadataStore>,
    environment: Environment,
    fetcher: InfoFetcher,
    builder: GadgetToolBuilder,
}

impl std::fmt::Debug for GadgetCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GadgetCatalog")
            .field("environment", &self.environment)
            .field("fetcher", &self.fetcher)
            .finish_non_exhaustive()
    }
}

impl GadgetCatalog {
    /// Creates a catalog backed by `manager` and persisted in `store`.
    #[must_use]
    pub fn new(
        manager: Arc<dyn GadgetManager>,
        store: Arc<dyn MetadataStore>,
        environment: Environment,
        fetch: FetchConfig,
    ) -> Self {
        Self {
            fetcher: InfoFetcher::new(Arc::clone(&manager), fetch),
            builder: GadgetToolBuilder::new(Arc::clone(&manager), environment),
            manager,
            store,
            environment,
        }
    }

    /// Resolves descriptors for `gadgets`, reusing the cache saved for the
    /// current backend version and saving the refreshed set afterwards.
    ///
    /// Version, cache and persistence failures are logged and never fail the
    /// round.
    pub async fn descriptors(&self, gadgets: &[DiscoveredGadget]) -> DescriptorMap {
        let version = match self.manager.get_version().await {
            Ok(version) => version,
            Err(err) => {
                warn!(error = %err, "could not get gadget manager version, proceeding without cache");
                String::new()
            }
        };

        let cached = match self.store.load(&version, self.environment).await {
            Ok(cached) => cached,
            Err(err) => {
                debug!(error = %err, "no valid cache found, proceeding without cache");
                DescriptorMap::new()
            }
        };
        if cached.is_empty() {
            info!("fetching gadget information without cache, initial load may take several seconds");
        }

        let descriptors = self
            .fetcher
            .fetch_all(gadgets.iter().map(|gadget| &gadget.image), &cached)
            .await;

        if let Err(err) = self.store.save(&version, self.environment, &descriptors).await {
            warn!(error = %err, "could not save cache");
        }
        descriptors
    }

    /// Builds one functional tool per resolvable gadget.
    pub async fn tools(&self, gadgets: &[DiscoveredGadget]) -> Vec<ToolDescriptor> {
        let descriptors = self.descriptors(gadgets).await;
        self.builder.build_all(&descriptors)
    }
}
