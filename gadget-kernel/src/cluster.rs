//! Cluster access needed to manage the gadget deployment.

use async_trait::async_trait;
use tracing::debug;

use crate::error::{KernelError, KernelResult};

/// Label selector matching gadget pods.
pub const GADGET_POD_SELECTOR: &str = "k8s-app=gadget";
/// Chart repository; the version is appended as a tag.
pub const CHART_REPOSITORY: &str = "oci://ghcr.io/inspektor-gadget/inspektor-gadget/charts/gadget";
/// Release name used for chart operations.
pub const RELEASE_NAME: &str = "gadget";
/// Namespace used for chart operations.
pub const RELEASE_NAMESPACE: &str = "gadget";

/// Returns the chart reference for `version`.
#[must_use]
pub fn chart_reference(version: &str) -> String {
    format!("{CHART_REPOSITORY}:{version}")
}

/// Pod listing and chart operations against the target cluster.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Returns the namespace of every pod matching `selector`, across all
    /// namespaces.
    async fn pod_namespaces(&self, selector: &str) -> KernelResult<Vec<String>>;

    /// Installs `chart` as `release` into `namespace`, returning a summary.
    async fn install_chart(&self, chart: &str, release: &str, namespace: &str) -> KernelResult<String>;

    /// Uninstalls `release` from `namespace`, returning a summary.
    async fn uninstall_chart(&self, release: &str, namespace: &str) -> KernelResult<String>;

    /// Upgrades `release` in `namespace` to `chart`, returning a summary.
    async fn upgrade_chart(&self, chart: &str, release: &str, namespace: &str) -> KernelResult<String>;

    /// Returns `true` if `release` exists in `namespace`.
    async fn release_exists(&self, release: &str, namespace: &str) -> KernelResult<bool>;
}

/// Where the gadget backend runs, as seen from its pods.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeploymentState {
    /// No gadget pods exist.
    NotDeployed,
    /// Gadget pods exist in exactly one namespace.
    Deployed {
        /// Namespace hosting the pods.
        namespace: String,
    },
}

impl DeploymentState {
    /// Returns `true` when deployed.
    #[must_use]
    pub fn is_deployed(&self) -> bool {
        matches!(self, Self::Deployed { .. })
    }
}

/// Detects whether the gadget backend is deployed.
///
/// # Errors
///
/// Returns [`KernelError::AmbiguousDeployment`] when gadget pods span more
/// than one namespace, or the client's error when pods cannot be listed.
pub async fn detect_deployment(client: &dyn ClusterClient) -> KernelResult<DeploymentState> {
    let pods = client.pod_namespaces(GADGET_POD_SELECTOR).await?;
    let mut namespaces: Vec<String> = Vec::new();
    for namespace in pods {
        if !namespaces.contains(&namespace) {
            namespaces.push(namespace);
        }
    }

    match namespaces.len() {
        0 => {
            debug!("no Inspektor Gadget pods found");
            Ok(DeploymentState::NotDeployed)
        }
        1 => Ok(DeploymentState::Deployed {
            namespace: namespaces.remove(0),
        }),
        _ => {
            debug!(?namespaces, "multiple namespaces found for Inspektor Gadget pods");
            Err(KernelError::AmbiguousDeployment { namespaces })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Pods(Vec<&'static str>);

    #[async_trait]
    impl ClusterClient for Pods {
        async fn pod_namespaces(&self, selector: &str) -> KernelResult<Vec<String>> {
            assert_eq!(selector, GADGET_POD_SELECTOR);
            Ok(self.0.iter().map(|ns| (*ns).to_owned()).collect())
        }

        async fn install_chart(&self, _: &str, _: &str, _: &str) -> KernelResult<String> {
            unimplemented!()
        }

        async fn uninstall_chart(&self, _: &str, _: &str) -> KernelResult<String> {
            unimplemented!()
        }

        async fn upgrade_chart(&self, _: &str, _: &str, _: &str) -> KernelResult<String> {
            unimplemented!()
        }

        async fn release_exists(&self, _: &str, _: &str) -> KernelResult<bool> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn state_follows_pod_namespaces() {
        assert_eq!(
            detect_deployment(&Pods(vec![])).await.unwrap(),
            DeploymentState::NotDeployed
        );
        assert_eq!(
            detect_deployment(&Pods(vec!["gadget", "gadget"])).await.unwrap(),
            DeploymentState::Deployed {
                namespace: "gadget".into()
            }
        );
    }

    #[tokio::test]
    async fn pods_in_several_namespaces_are_ambiguous() {
        let err = detect_deployment(&Pods(vec!["gadget", "kube-system", "gadget"]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            KernelError::AmbiguousDeployment { namespaces } if namespaces == ["gadget", "kube-system"]
        ));
    }

    #[test]
    fn chart_reference_appends_version() {
        assert_eq!(
            chart_reference("0.41.0"),
            "oci://ghcr.io/inspektor-gadget/inspektor-gadget/charts/gadget:0.41.0"
        );
    }
}
