//! Server assembly and the protocol-facing catalog.

use std::sync::{Arc, PoisonError, RwLock};

use gadget_cache::{FileMetadataStore, MetadataStore, VolatileMetadataStore};
use gadget_config::ServerConfig;
use gadget_kernel::{
    BuiltinDiscoverer, ClusterClient, Discoverer, FetchConfig, GadgetToolRegistry, LatestReleaseResolver,
    VersionResolver,
};
use gadget_manager::{GadgetRuntime, ManagerConfig, RemoteGadgetManager};
use gadget_primitives::Environment;
use gadget_tools::{Arguments, ToolResponse, ToolSnapshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ServerResult;

/// Builder for [`Server`].
pub struct ServerBuilder {
    config: ServerConfig,
    runtime: Arc<dyn GadgetRuntime>,
    cluster: Option<Arc<dyn ClusterClient>>,
    resolver: Option<Arc<dyn VersionResolver>>,
    discoverer: Option<Arc<dyn Discoverer>>,
    store: Option<Arc<dyn MetadataStore>>,
}

impl std::fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ServerBuilder {
    /// Replaces the configuration.
    #[must_use]
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the cluster access used in the Kubernetes environment.
    #[must_use]
    pub fn cluster(mut self, cluster: Arc<dyn ClusterClient>) -> Self {
        self.cluster = Some(cluster);
        self
    }

    /// Overrides the chart version resolver. Defaults to the latest GitHub
    /// release.
    #[must_use]
    pub fn version_resolver(mut self, resolver: Arc<dyn VersionResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Sets an external gadget discoverer. It takes precedence over the
    /// discoverer named in the configuration.
    #[must_use]
    pub fn discoverer(mut self, discoverer: Arc<dyn Discoverer>) -> Self {
        self.discoverer = Some(discoverer);
        self
    }

    /// Overrides the descriptor cache. Defaults to the cache directory.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn MetadataStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Validates the configuration and assembles the server.
    ///
    /// The catalog stays empty until [`Server::prepare`] runs.
    ///
    /// # Errors
    ///
    /// Returns a [`ServerError`](crate::ServerError) when the configuration is
    /// invalid, the manager cannot be created, or the registry is missing a
    /// part its environment needs.
    pub fn build(self) -> ServerResult<Server> {
        let config = self.config;
        config.validate()?;
        let environment = config.environment()?;

        let mut manager_config = ManagerConfig::new(environment);
        if let Some(address) = config.remote_address() {
            manager_config = manager_config.with_remote_address(address);
        }
        let shutdown = CancellationToken::new();
        let manager = Arc::new(
            RemoteGadgetManager::new(self.runtime, manager_config)?
                .with_shutdown_token(shutdown.clone()),
        );

        let store = match self.store {
            Some(store) => store,
            None => open_store(&config),
        };
        let fetch = FetchConfig::new(
            config.fetch_concurrency()?,
            config.fetch_attempts()?,
            config.fetch_retry_delay(),
        );

        let mut registry = GadgetToolRegistry::builder(manager, environment)
            .read_only(config.read_only)
            .store(store)
            .fetch_config(fetch)
            .chart_version(config.chart_version().map(str::to_owned));
        let discoverer = match (self.discoverer, config.gadget_discoverer()?) {
            (Some(discoverer), _) => Some(discoverer),
            (None, Some(_)) => Some(Arc::new(BuiltinDiscoverer) as Arc<dyn Discoverer>),
            (None, None) => None,
        };
        if let Some(discoverer) = discoverer {
            registry = registry.discoverer(discoverer);
        }
        if environment == Environment::Kubernetes {
            let resolver = self
                .resolver
                .unwrap_or_else(|| Arc::new(LatestReleaseResolver::github()));
            registry = registry.version_resolver(resolver);
            if let Some(cluster) = self.cluster {
                registry = registry.cluster(cluster);
            }
        }
        let registry = registry.build()?;

        let catalog = Arc::new(RwLock::new(Arc::new(ToolSnapshot::default())));
        {
            let catalog = Arc::clone(&catalog);
            registry.tools().subscribe(move |snapshot| {
                debug!(tools_count = snapshot.len(), "publishing tool catalog");
                *catalog.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
            });
        }

        info!(%environment, read_only = config.read_only, "server assembled");
        Ok(Server {
            config,
            registry,
            catalog,
            shutdown,
        })
    }
}

fn open_store(config: &ServerConfig) -> Arc<dyn MetadataStore> {
    if let Some(dir) = &config.cache_dir {
        return Arc::new(FileMetadataStore::new(dir.clone()));
    }
    match FileMetadataStore::in_default_dir() {
        Ok(store) => Arc::new(store),
        Err(err) => {
            warn!(error = %err, "no cache directory available, keeping descriptors in memory");
            Arc::new(VolatileMetadataStore::new())
        }
    }
}

/// An assembled server: the tool registry plus the catalog last published
/// to the protocol layer.
pub struct Server {
    config: ServerConfig,
    registry: Arc<GadgetToolRegistry>,
    catalog: Arc<RwLock<Arc<ToolSnapshot>>>,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("registry", &self.registry)
            .field("shut_down", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Server {
    /// Starts building a server over `runtime` with the default configuration.
    #[must_use]
    pub fn builder(runtime: Arc<dyn GadgetRuntime>) -> ServerBuilder {
        ServerBuilder {
            config: ServerConfig::default(),
            runtime,
            cluster: None,
            resolver: None,
            discoverer: None,
            store: None,
        }
    }

    /// Returns the configuration the server was built with.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the gadget tool registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<GadgetToolRegistry> {
        &self.registry
    }

    /// Discovers gadgets and publishes the initial catalog.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Registry`](crate::ServerError::Registry) when
    /// no gadget source can be read.
    pub async fn prepare(&self) -> ServerResult<()> {
        let images = self.config.images();
        self.registry.prepare(images.as_slice()).await?;
        info!(tools_count = self.list_tools().len(), "tool catalog ready");
        Ok(())
    }

    /// Returns the catalog last published to the protocol layer.
    #[must_use]
    pub fn list_tools(&self) -> Arc<ToolSnapshot> {
        let catalog = self.catalog.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*catalog)
    }

    /// Calls a published tool.
    ///
    /// Every failure, including an unknown tool or a handler error, comes
    /// back as an error response.
    pub async fn call_tool(&self, name: &str, arguments: Arguments) -> ToolResponse {
        let catalog = self.list_tools();
        let Some(tool) = catalog.get(name) else {
            return ToolResponse::error(format!("tool `{name}` is not registered"));
        };
        debug!(tool = name, "dispatching tool call");
        match tool.call(arguments).await {
            Ok(response) => response,
            Err(err) => {
                debug!(tool = name, error = %err, "tool call failed");
                ToolResponse::error(err.to_string())
            }
        }
    }

    /// Cancels in-flight foreground gadget runs. Detached runs keep running
    /// in the backend.
    pub fn shutdown(&self) {
        info!("shutting down");
        self.shutdown.cancel();
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) was called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}
