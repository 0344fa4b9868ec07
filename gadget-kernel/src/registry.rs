//! Environment-aware assembly of the exposed tool catalog.

use std::sync::{Arc, Weak};

use futures::future::{BoxFuture, FutureExt};
use gadget_cache::{MetadataStore, VolatileMetadataStore};
use gadget_manager::GadgetManager;
use gadget_primitives::Environment;
use gadget_tools::{ToolDescriptor, ToolRegistry};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::catalog::GadgetCatalog;
use crate::cluster::{ClusterClient, detect_deployment};
use crate::deploy::{DeployTool, Refresher};
use crate::discovery::{BuiltinDiscoverer, DiscoveredGadget, Discoverer, discover_from_images};
use crate::ephemeral::ephemeral_tools;
use crate::error::{KernelError, KernelResult};
use crate::fetcher::FetchConfig;
use crate::instances::instance_tool;
use crate::release::VersionResolver;

struct Deployment {
    cluster: Arc<dyn ClusterClient>,
    resolver: Arc<dyn VersionResolver>,
    pinned_version: Option<String>,
}

/// Builder for [`GadgetToolRegistry`].
pub struct GadgetToolRegistryBuilder {
    manager: Arc<dyn GadgetManager>,
    environment: Environment,
    read_only: bool,
    discoverer: Option<Arc<dyn Discoverer>>,
    cluster: Option<Arc<dyn ClusterClient>>,
    resolver: Option<Arc<dyn VersionResolver>>,
    pinned_version: Option<String>,
    store: Option<Arc<dyn MetadataStore>>,
    fetch: FetchConfig,
}

impl std::fmt::Debug for GadgetToolRegistryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GadgetToolRegistryBuilder")
            .field("environment", &self.environment)
            .field("read_only", &self.read_only)
            .field("pinned_version", &self.pinned_version)
            .finish_non_exhaustive()
    }
}

impl GadgetToolRegistryBuilder {
    /// Hides mutating tools from every snapshot.
    #[must_use]
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Sets the discoverer consulted when no explicit images are given.
    #[must_use]
    pub fn discoverer(mut self, discoverer: Arc<dyn Discoverer>) -> Self {
        self.discoverer = Some(discoverer);
        self
    }

    /// Sets the cluster access used by the deployment tool.
    #[must_use]
    pub fn cluster(mut self, cluster: Arc<dyn ClusterClient>) -> Self {
        self.cluster = Some(cluster);
        self
    }

    /// Sets the resolver picking the chart version to deploy.
    #[must_use]
    pub fn version_resolver(mut self, resolver: Arc<dyn VersionResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Pins the chart version used when a deploy call does not name one.
    #[must_use]
    pub fn chart_version(mut self, version: Option<String>) -> Self {
        self.pinned_version = version;
        self
    }

    /// Sets the descriptor cache. Defaults to a process-local store.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn MetadataStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the limits of descriptor fetch rounds.
    #[must_use]
    pub fn fetch_config(mut self, fetch: FetchConfig) -> Self {
        self.fetch = fetch;
        self
    }

    /// Builds the registry.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::Configuration`] when the Kubernetes environment
    /// is selected without a cluster client or version resolver.
    pub fn build(self) -> KernelResult<Arc<GadgetToolRegistry>> {
        let deployment = match (self.environment, self.cluster, self.resolver) {
            (Environment::Kubernetes, Some(cluster), Some(resolver)) => Some(Deployment {
                cluster,
                resolver,
                pinned_version: self.pinned_version,
            }),
            (Environment::Kubernetes, _, _) => {
                return Err(KernelError::configuration(
                    "kubernetes environment requires a cluster client and a version resolver",
                ));
            }
            (Environment::Linux, _, _) => None,
        };

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(VolatileMetadataStore::new()));
        let catalog = GadgetCatalog::new(
            Arc::clone(&self.manager),
            store,
            self.environment,
            self.fetch,
        );

        Ok(Arc::new_cyclic(|this| GadgetToolRegistry {
            this: this.clone(),
            tools: Arc::new(ToolRegistry::new(self.read_only)),
            manager: self.manager,
            environment: self.environment,
            discoverer: self.discoverer,
            deployment,
            catalog,
            prepare: Mutex::new(()),
        }))
    }
}

/// Registry of gadget tools for one environment.
///
/// [`prepare`](Self::prepare) discovers gadgets, builds the tools for the
/// current deployment state and atomically replaces the published catalog.
/// In Kubernetes a successful deploy through `ig_deploy` schedules the same
/// rebuild in the background.
pub struct GadgetToolRegistry {
    this: Weak<GadgetToolRegistry>,
    tools: Arc<ToolRegistry>,
    manager: Arc<dyn GadgetManager>,
    environment: Environment,
    discoverer: Option<Arc<dyn Discoverer>>,
    deployment: Option<Deployment>,
    catalog: GadgetCatalog,
    prepare: Mutex<()>,
}

impl std::fmt::Debug for GadgetToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GadgetToolRegistry")
            .field("environment", &self.environment)
            .field("tools", &self.tools)
            .finish_non_exhaustive()
    }
}

impl GadgetToolRegistry {
    /// Starts building a registry dispatching to `manager`.
    #[must_use]
    pub fn builder(
        manager: Arc<dyn GadgetManager>,
        environment: Environment,
    ) -> GadgetToolRegistryBuilder {
        GadgetToolRegistryBuilder {
            manager,
            environment,
            read_only: false,
            discoverer: None,
            cluster: None,
            resolver: None,
            pinned_version: None,
            store: None,
            fetch: FetchConfig::default(),
        }
    }

    /// Returns the published tool registry.
    #[must_use]
    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// Returns the active environment.
    #[must_use]
    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Discovers gadgets and publishes the matching tool set.
    ///
    /// `images` takes precedence over the configured discoverer, which takes
    /// precedence over the builtin catalog.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::Discovery`] when the builtin catalog cannot be
    /// read. Every other failure is logged and degrades the tool set.
    pub async fn prepare<S: AsRef<str>>(&self, images: &[S]) -> KernelResult<()> {
        let _guard = self.prepare.lock().await;
        let gadgets = Arc::new(self.discover(images).await?);
        let tools = self.assemble(&gadgets).await;
        self.tools.replace_tools(tools);
        Ok(())
    }

    async fn discover<S: AsRef<str>>(&self, images: &[S]) -> KernelResult<Vec<DiscoveredGadget>> {
        let mut gadgets = discover_from_images(images);

        if gadgets.is_empty() {
            if let Some(discoverer) = &self.discoverer {
                gadgets = discoverer.list_gadgets().await.unwrap_or_else(|err| {
                    warn!(error = %err, "listing gadgets from discoverer");
                    Vec::new()
                });
            }
        }

        if gadgets.is_empty() {
            gadgets = BuiltinDiscoverer.list_gadgets().await?;
        }
        debug!(count = gadgets.len(), "discovered gadgets");
        Ok(gadgets)
    }

    async fn assemble(&self, gadgets: &Arc<Vec<DiscoveredGadget>>) -> Vec<ToolDescriptor> {
        let mut tools = vec![instance_tool(Arc::clone(&self.manager))];

        let Some(deployment) = &self.deployment else {
            tools.extend(self.catalog.tools(gadgets).await);
            return tools;
        };

        tools.push(
            DeployTool::new(
                Arc::clone(&deployment.cluster),
                Arc::clone(&deployment.resolver),
                self.refresher(gadgets),
            )
            .with_pinned_version(deployment.pinned_version.clone())
            .into_descriptor(),
        );

        let deployed = match detect_deployment(deployment.cluster.as_ref()).await {
            Ok(state) => state.is_deployed(),
            Err(err) => {
                warn!(error = %err, "failed to check if Inspektor Gadget is deployed");
                false
            }
        };
        if deployed {
            tools.extend(self.catalog.tools(gadgets).await);
        } else {
            tools.extend(ephemeral_tools(gadgets));
        }
        tools
    }

    fn refresher(&self, gadgets: &Arc<Vec<DiscoveredGadget>>) -> Refresher {
        let this = self.this.clone();
        let gadgets = Arc::clone(gadgets);
        Arc::new(move || {
            if let Some(registry) = this.upgrade() {
                tokio::spawn(registry.rebuild(Arc::clone(&gadgets)));
            }
        })
    }

    fn rebuild(self: Arc<Self>, gadgets: Arc<Vec<DiscoveredGadget>>) -> BoxFuture<'static, ()> {
        async move {
            let _guard = self.prepare.lock().await;
            info!("refreshing gadget tools after deployment");
            let tools = self.assemble(&gadgets).await;
            self.tools.replace_tools(tools);
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroUsize;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use gadget_manager::{ExecutionResult, GadgetInstance, GadgetResult};
    use gadget_primitives::{GadgetDescriptor, GadgetRef, InstanceId, ParamMap};
    use gadget_tools::{Arguments, ReadOnlyHint, ToolSnapshot};
    use serde_json::json;

    use crate::cluster::GADGET_POD_SELECTOR;

    #[derive(Default)]
    struct InfoManager {
        info_calls: AtomicUsize,
    }

    #[async_trait]
    impl GadgetManager for InfoManager {
        async fn run(&self, _: &GadgetRef, _: ParamMap, _: Option<Duration>) -> GadgetResult<ExecutionResult> {
            unimplemented!()
        }

        async fn run_detached(&self, _: &GadgetRef, _: ParamMap) -> GadgetResult<InstanceId> {
            unimplemented!()
        }

        async fn get_results(&self, _: &InstanceId) -> GadgetResult<ExecutionResult> {
            unimplemented!()
        }

        async fn stop(&self, _: &InstanceId) -> GadgetResult<()> {
            unimplemented!()
        }

        async fn get_info(&self, image: &GadgetRef) -> GadgetResult<GadgetDescriptor> {
            self.info_calls.fetch_add(1, Ordering::SeqCst);
            let name = image.repository_name()?.to_owned();
            Ok(GadgetDescriptor::builder(image.as_str())
                .metadata(format!("name: {name}\ndescription: test\n"))
                .build()?)
        }

        async fn get_version(&self) -> GadgetResult<String> {
            Ok("v1".into())
        }

        async fn list_gadgets(&self) -> GadgetResult<Vec<GadgetInstance>> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct SwitchCluster {
        deployed: AtomicBool,
    }

    #[async_trait]
    impl ClusterClient for SwitchCluster {
        async fn pod_namespaces(&self, selector: &str) -> KernelResult<Vec<String>> {
            assert_eq!(selector, GADGET_POD_SELECTOR);
            if self.deployed.load(Ordering::SeqCst) {
                Ok(vec!["gadget".into()])
            } else {
                Ok(Vec::new())
            }
        }

        async fn install_chart(&self, _: &str, _: &str, _: &str) -> KernelResult<String> {
            self.deployed.store(true, Ordering::SeqCst);
            Ok("deployed".into())
        }

        async fn uninstall_chart(&self, _: &str, _: &str) -> KernelResult<String> {
            self.deployed.store(false, Ordering::SeqCst);
            Ok("undeployed".into())
        }

        async fn upgrade_chart(&self, _: &str, _: &str, _: &str) -> KernelResult<String> {
            Ok("upgraded".into())
        }

        async fn release_exists(&self, _: &str, _: &str) -> KernelResult<bool> {
            Ok(true)
        }
    }

    struct Pinned;

    #[async_trait]
    impl VersionResolver for Pinned {
        async fn chart_version(&self) -> String {
            "0.41.0".into()
        }
    }

    struct FailingDiscoverer;

    #[async_trait]
    impl Discoverer for FailingDiscoverer {
        async fn list_gadgets(&self) -> KernelResult<Vec<DiscoveredGadget>> {
            Err(KernelError::Discovery {
                source_name: "remote",
                reason: "unreachable".into(),
            })
        }
    }

    fn fetch() -> FetchConfig {
        FetchConfig::new(
            NonZeroUsize::new(4).unwrap(),
            NonZeroUsize::new(1).unwrap(),
            Duration::from_millis(1),
        )
    }

    const IMAGES: [&str; 2] = ["registry/trace_dns:latest", "registry/trace_exec:latest"];

    fn kubernetes(cluster: Arc<SwitchCluster>, read_only: bool) -> Arc<GadgetToolRegistry> {
        GadgetToolRegistry::builder(Arc::new(InfoManager::default()), Environment::Kubernetes)
            .read_only(read_only)
            .cluster(cluster)
            .version_resolver(Arc::new(Pinned))
            .fetch_config(fetch())
            .build()
            .unwrap()
    }

    async fn wait_for<F>(snapshots: &StdMutex<Vec<Arc<ToolSnapshot>>>, predicate: F)
    where
        F: Fn(&ToolSnapshot) -> bool,
    {
        for _ in 0..200 {
            let done = snapshots
                .lock()
                .unwrap()
                .last()
                .is_some_and(|snapshot| predicate(snapshot));
            if done {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("catalog did not reach the expected state");
    }

    #[tokio::test]
    async fn undeployed_cluster_gets_placeholders_then_functional_tools() {
        let cluster = Arc::new(SwitchCluster::default());
        let registry = kubernetes(cluster.clone(), false);
        let snapshots = Arc::new(StdMutex::new(Vec::new()));
        {
            let snapshots = Arc::clone(&snapshots);
            registry
                .tools()
                .subscribe(move |snapshot| snapshots.lock().unwrap().push(snapshot));
        }

        registry.prepare(&IMAGES).await.unwrap();
        let snapshot = registry.tools().snapshot();
        assert_eq!(
            snapshot.names(),
            ["gadget_trace_dns", "gadget_trace_exec", "ig_deploy", "ig_gadgets"]
        );
        let placeholder = snapshot.get("gadget_trace_dns").unwrap();
        assert_eq!(placeholder.read_only(), ReadOnlyHint::Unspecified);

        let mut args = Arguments::new();
        args.insert("action".into(), json!("deploy"));
        let response = registry.tools().invoke("ig_deploy", args).await.unwrap();
        assert_eq!(response.content(), "deployed");

        wait_for(&snapshots, |snapshot| {
            snapshot
                .get("gadget_trace_dns")
                .is_some_and(|tool| tool.read_only() == ReadOnlyHint::ReadOnly)
        })
        .await;
        let last = snapshots.lock().unwrap().last().cloned().unwrap();
        assert_eq!(last.len(), 4);
    }

    #[tokio::test]
    async fn read_only_mode_hides_lifecycle_tools() {
        let cluster = Arc::new(SwitchCluster {
            deployed: AtomicBool::new(true),
        });
        let registry = kubernetes(cluster, true);

        registry.prepare(&IMAGES).await.unwrap();

        assert_eq!(
            registry.tools().snapshot().names(),
            ["gadget_trace_dns", "gadget_trace_exec"]
        );
    }

    #[tokio::test]
    async fn linux_always_builds_functional_tools() {
        let manager = Arc::new(InfoManager::default());
        let registry = GadgetToolRegistry::builder(manager.clone(), Environment::Linux)
            .fetch_config(fetch())
            .build()
            .unwrap();

        registry.prepare(&IMAGES[..1]).await.unwrap();

        assert_eq!(
            registry.tools().snapshot().names(),
            ["gadget_trace_dns", "ig_gadgets"]
        );
        assert_eq!(manager.info_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failing_discoverer_falls_back_to_builtin_catalog() {
        let registry = GadgetToolRegistry::builder(Arc::new(InfoManager::default()), Environment::Kubernetes)
            .discoverer(Arc::new(FailingDiscoverer))
            .cluster(Arc::new(SwitchCluster::default()))
            .version_resolver(Arc::new(Pinned))
            .build()
            .unwrap();

        registry.prepare::<&str>(&[]).await.unwrap();

        let snapshot = registry.tools().snapshot();
        assert!(snapshot.get("gadget_trace_dns").is_some());
        assert!(snapshot.len() > 2);
    }

    #[test]
    fn kubernetes_requires_cluster_access() {
        let err = GadgetToolRegistry::builder(Arc::new(InfoManager::default()), Environment::Kubernetes)
            .build()
            .unwrap_err();
        assert!(matches!(err, KernelError::Configuration { .. }));
    }
}
