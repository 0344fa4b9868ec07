//! The `ig_deploy` tool managing the gadget backend deployment.

use std::sync::Arc;

use async_trait::async_trait;
use gadget_tools::{
    Arguments, InputSchema, ReadOnlyHint, ToolDescriptor, ToolError, ToolHandler, ToolResponse,
    ToolResult,
};
use serde_json::Value;
use tracing::{debug, info};

use crate::action::{ACTION_ARG, Action, DeployAction, parse_action};
use crate::cluster::{
    ClusterClient, RELEASE_NAME, RELEASE_NAMESPACE, chart_reference, detect_deployment,
};
use crate::release::VersionResolver;

/// Name of the deployment tool.
pub const DEPLOY_TOOL_NAME: &str = "ig_deploy";

/// Callback run after a successful deployment to rebuild the catalog.
pub type Refresher = Arc<dyn Fn() + Send + Sync>;

/// Builds the deployment tool.
pub struct DeployTool {
    cluster: Arc<dyn ClusterClient>,
    resolver: Arc<dyn VersionResolver>,
    pinned_version: Option<String>,
    refresher: Refresher,
}

impl std::fmt::Debug for DeployTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeployTool")
            .field("pinned_version", &self.pinned_version)
            .finish_non_exhaustive()
    }
}

impl DeployTool {
    /// Creates the tool over a cluster client and version resolver.
    #[must_use]
    pub fn new(
        cluster: Arc<dyn ClusterClient>,
        resolver: Arc<dyn VersionResolver>,
        refresher: Refresher,
    ) -> Self {
        Self {
            cluster,
            resolver,
            pinned_version: None,
            refresher,
        }
    }

    /// Pins the chart version used when a call does not name one.
    #[must_use]
    pub fn with_pinned_version(mut self, version: Option<String>) -> Self {
        self.pinned_version = version.filter(|version| !version.is_empty());
        self
    }

    /// Converts the tool into a registrable descriptor.
    #[must_use]
    pub fn into_descriptor(self) -> ToolDescriptor {
        let schema = InputSchema::new()
            .enumeration(
                ACTION_ARG,
                "Lifecycle action to perform: deploy(deploy Inspektor Gadget), \
                 undeploy(undeploy Inspektor Gadget), upgrade(upgrade Inspektor Gadget), \
                 is_deployed(check if Inspektor Gadget is deployed)",
                DeployAction::ALL.iter().map(|action| action.as_str()),
            )
            .string(
                "chart_version",
                "Version of the Inspektor Gadget Helm chart to deploy, only set if user \
                 explicitly specifies a version",
            );
        ToolDescriptor::new(
            DEPLOY_TOOL_NAME,
            "Manage the deployment of Inspektor Gadget on target system",
            self,
        )
        .with_input_schema(schema)
        .with_read_only(ReadOnlyHint::Mutating)
    }

    async fn chart(&self, arguments: &Arguments) -> String {
        let explicit = arguments
            .get("chart_version")
            .and_then(Value::as_str)
            .filter(|version| !version.is_empty())
            .map(str::to_owned);
        let version = match explicit.or_else(|| self.pinned_version.clone()) {
            Some(version) => version,
            None => self.resolver.chart_version().await,
        };
        chart_reference(&version)
    }

    async fn deploy(&self, arguments: &Arguments) -> ToolResponse {
        let chart = self.chart(arguments).await;
        info!(chart = %chart, "deploying Inspektor Gadget");
        match self
            .cluster
            .install_chart(&chart, RELEASE_NAME, RELEASE_NAMESPACE)
            .await
        {
            Ok(summary) => {
                (self.refresher)();
                ToolResponse::text(summary)
            }
            Err(err) => ToolResponse::error(format!("failed to deploy Inspektor Gadget: {err}")),
        }
    }

    async fn undeploy(&self) -> ToolResponse {
        info!("undeploying Inspektor Gadget");
        match self
            .cluster
            .uninstall_chart(RELEASE_NAME, RELEASE_NAMESPACE)
            .await
        {
            Ok(summary) => ToolResponse::text(summary),
            Err(err) => ToolResponse::error(format!("failed to undeploy Inspektor Gadget: {err}")),
        }
    }

    async fn upgrade(&self, arguments: &Arguments) -> ToolResponse {
        let chart = self.chart(arguments).await;
        let exists = self
            .cluster
            .release_exists(RELEASE_NAME, RELEASE_NAMESPACE)
            .await;
        if !matches!(exists, Ok(true)) {
            debug!(?exists, "release lookup before upgrade");
            return ToolResponse::error(format!(
                "cannot upgrade Inspektor Gadget: helm release {RELEASE_NAME} in namespace \
                 {RELEASE_NAMESPACE} does not exist. Did you deploy it manually?"
            ));
        }

        info!(chart = %chart, "upgrading Inspektor Gadget");
        match self
            .cluster
            .upgrade_chart(&chart, RELEASE_NAME, RELEASE_NAMESPACE)
            .await
        {
            Ok(summary) => ToolResponse::text(summary),
            Err(err) => ToolResponse::error(format!("failed to upgrade Inspektor Gadget: {err}")),
        }
    }
}

#[async_trait]
impl ToolHandler for DeployTool {
    async fn call(&self, arguments: Arguments) -> ToolResult<ToolResponse> {
        let action = match parse_action::<DeployAction>(&arguments) {
            Ok(action) => action,
            Err(response) => return Ok(response),
        };

        let state = detect_deployment(self.cluster.as_ref())
            .await
            .map_err(|err| {
                ToolError::execution(format!("check if Inspektor Gadget is deployed: {err}"))
            })?;
        let deployed = state.is_deployed();
        debug!(%action, deployed, "handling deployment action");

        let response = match action {
            DeployAction::Deploy if deployed => {
                ToolResponse::error("Inspektor Gadget is already deployed")
            }
            DeployAction::Deploy => self.deploy(&arguments).await,
            DeployAction::Undeploy if !deployed => {
                ToolResponse::error("Inspektor Gadget is not deployed")
            }
            DeployAction::Undeploy => self.undeploy().await,
            DeployAction::Upgrade if !deployed => {
                ToolResponse::error("Inspektor Gadget is not deployed, cannot upgrade")
            }
            DeployAction::Upgrade => self.upgrade(&arguments).await,
            DeployAction::IsDeployed if deployed => ToolResponse::text("Inspektor Gadget is deployed"),
            DeployAction::IsDeployed => ToolResponse::text("Inspektor Gadget is not deployed"),
        };
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use crate::cluster::GADGET_POD_SELECTOR;
    use crate::error::{KernelError, KernelResult};

    #[derive(Default)]
    struct FakeCluster {
        namespaces: Vec<&'static str>,
        release_exists: bool,
        fail_install: bool,
        chart_calls: AtomicUsize,
        charts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ClusterClient for FakeCluster {
        async fn pod_namespaces(&self, selector: &str) -> KernelResult<Vec<String>> {
            assert_eq!(selector, GADGET_POD_SELECTOR);
            Ok(self.namespaces.iter().map(|ns| (*ns).to_owned()).collect())
        }

        async fn install_chart(&self, chart: &str, release: &str, namespace: &str) -> KernelResult<String> {
            self.chart_calls.fetch_add(1, Ordering::SeqCst);
            self.charts.lock().unwrap().push(chart.to_owned());
            if self.fail_install {
                return Err(KernelError::cluster("image pull backoff"));
            }
            Ok(format!("installed {release} in {namespace}"))
        }

        async fn uninstall_chart(&self, release: &str, _: &str) -> KernelResult<String> {
            self.chart_calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("uninstalled {release}"))
        }

        async fn upgrade_chart(&self, chart: &str, _: &str, _: &str) -> KernelResult<String> {
            self.chart_calls.fetch_add(1, Ordering::SeqCst);
            self.charts.lock().unwrap().push(chart.to_owned());
            Ok("upgraded".into())
        }

        async fn release_exists(&self, _: &str, _: &str) -> KernelResult<bool> {
            Ok(self.release_exists)
        }
    }

    struct FixedResolver(AtomicUsize);

    #[async_trait]
    impl VersionResolver for FixedResolver {
        async fn chart_version(&self) -> String {
            self.0.fetch_add(1, Ordering::SeqCst);
            "0.41.0".into()
        }
    }

    struct Harness {
        cluster: Arc<FakeCluster>,
        resolver: Arc<FixedResolver>,
        refreshes: Arc<AtomicUsize>,
        tool: ToolDescriptor,
    }

    fn harness(cluster: FakeCluster, pinned: Option<&str>) -> Harness {
        let cluster = Arc::new(cluster);
        let resolver = Arc::new(FixedResolver(AtomicUsize::new(0)));
        let refreshes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&refreshes);
        let tool = DeployTool::new(
            cluster.clone(),
            resolver.clone(),
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .with_pinned_version(pinned.map(str::to_owned))
        .into_descriptor();
        Harness {
            cluster,
            resolver,
            refreshes,
            tool,
        }
    }

    fn args(value: Value) -> Arguments {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn deploy_when_already_deployed_touches_no_chart() {
        let h = harness(
            FakeCluster {
                namespaces: vec!["gadget"],
                ..FakeCluster::default()
            },
            None,
        );

        let response = h.tool.call(args(json!({"action": "deploy"}))).await.unwrap();

        assert!(response.is_error());
        assert_eq!(response.content(), "Inspektor Gadget is already deployed");
        assert_eq!(h.cluster.chart_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.refreshes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn deploy_resolves_version_and_refreshes() {
        let h = harness(FakeCluster::default(), None);

        let response = h.tool.call(args(json!({"action": "deploy"}))).await.unwrap();

        assert!(!response.is_error());
        assert_eq!(response.content(), "installed gadget in gadget");
        assert_eq!(
            h.cluster.charts.lock().unwrap().as_slice(),
            [chart_reference("0.41.0")]
        );
        assert_eq!(h.refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn explicit_version_beats_pin_and_resolver() {
        let h = harness(FakeCluster::default(), Some("0.40.0"));

        h.tool
            .call(args(json!({"action": "deploy", "chart_version": "0.39.1"})))
            .await
            .unwrap();
        assert_eq!(h.cluster.charts.lock().unwrap()[0], chart_reference("0.39.1"));
        assert_eq!(h.resolver.0.load(Ordering::SeqCst), 0);

        let pinned = harness(FakeCluster::default(), Some("0.40.0"));
        pinned.tool.call(args(json!({"action": "deploy"}))).await.unwrap();
        assert_eq!(pinned.cluster.charts.lock().unwrap()[0], chart_reference("0.40.0"));
        assert_eq!(pinned.resolver.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_install_is_an_error_response_without_refresh() {
        let h = harness(
            FakeCluster {
                fail_install: true,
                ..FakeCluster::default()
            },
            None,
        );

        let response = h.tool.call(args(json!({"action": "deploy"}))).await.unwrap();

        assert!(response.is_error());
        assert!(response.content().starts_with("failed to deploy Inspektor Gadget:"));
        assert_eq!(h.refreshes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn undeploy_and_upgrade_require_a_deployment() {
        let h = harness(FakeCluster::default(), None);

        let undeploy = h.tool.call(args(json!({"action": "undeploy"}))).await.unwrap();
        assert_eq!(undeploy.content(), "Inspektor Gadget is not deployed");
        let upgrade = h.tool.call(args(json!({"action": "upgrade"}))).await.unwrap();
        assert_eq!(upgrade.content(), "Inspektor Gadget is not deployed, cannot upgrade");
        assert_eq!(h.cluster.chart_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn upgrade_requires_the_managed_release() {
        let manual = harness(
            FakeCluster {
                namespaces: vec!["kube-system"],
                ..FakeCluster::default()
            },
            None,
        );
        let response = manual.tool.call(args(json!({"action": "upgrade"}))).await.unwrap();
        assert!(response.is_error());
        assert!(response.content().contains("Did you deploy it manually?"));

        let managed = harness(
            FakeCluster {
                namespaces: vec!["gadget"],
                release_exists: true,
                ..FakeCluster::default()
            },
            None,
        );
        let response = managed.tool.call(args(json!({"action": "upgrade"}))).await.unwrap();
        assert_eq!(response.content(), "upgraded");
    }

    #[tokio::test]
    async fn ambiguous_deployment_is_a_tool_error() {
        let h = harness(
            FakeCluster {
                namespaces: vec!["gadget", "other"],
                ..FakeCluster::default()
            },
            None,
        );

        let err = h.tool.call(args(json!({"action": "is_deployed"}))).await.unwrap_err();
        assert!(err.to_string().contains("check if Inspektor Gadget is deployed"));
    }

    #[tokio::test]
    async fn is_deployed_reports_state() {
        let h = harness(
            FakeCluster {
                namespaces: vec!["gadget"],
                ..FakeCluster::default()
            },
            None,
        );
        let response = h.tool.call(args(json!({"action": "is_deployed"}))).await.unwrap();
        assert_eq!(response.content(), "Inspektor Gadget is deployed");
        assert_eq!(h.tool.read_only(), ReadOnlyHint::Mutating);
    }
}
