//! Chart version resolution.
//!
//! The latest published release is looked up once per resolver; the first
//! outcome, success or failure, is kept for the resolver's lifetime.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hyper::body::to_bytes;
use hyper::client::HttpConnector;
use hyper::header::{ACCEPT, USER_AGENT};
use hyper::{Body, Client, Request};
use hyper_rustls::HttpsConnector;
use rustls::{ClientConfig, OwnedTrustAnchor, RootCertStore};
use serde::Deserialize;
use tokio::sync::OnceCell;
use tokio::time::timeout;
use tracing::{debug, warn};
use webpki_roots::TLS_SERVER_ROOTS;

use crate::error::{KernelError, KernelResult};

/// Endpoint describing the latest Inspektor Gadget release.
pub const LATEST_RELEASE_URL: &str =
    "https://api.github.com/repos/inspektor-gadget/inspektor-gadget/releases/latest";

/// Budget for the latest-release request.
pub const RELEASE_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Returns the chart version this binary was built against, taken from
/// `IG_CHART_VERSION` at build time (`1.0.0-dev` when unset).
#[must_use]
pub fn embedded_chart_version() -> &'static str {
    env!("IG_CHART_VERSION")
}

/// Picks the chart version used when the caller did not name one.
#[async_trait]
pub trait VersionResolver: Send + Sync {
    /// Returns the chart version to deploy.
    async fn chart_version(&self) -> String;
}

/// Source of the latest published release version.
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// Returns the latest release version without a leading `v`.
    async fn latest_release(&self) -> KernelResult<String>;
}

/// Resolves to the latest published release, falling back to the embedded
/// version when the lookup failed.
pub struct LatestReleaseResolver {
    source: Arc<dyn ReleaseSource>,
    latest: OnceCell<Result<String, String>>,
}

impl std::fmt::Debug for LatestReleaseResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LatestReleaseResolver")
            .field("latest", &self.latest.get())
            .finish_non_exhaustive()
    }
}

impl LatestReleaseResolver {
    /// Creates a resolver over `source`.
    #[must_use]
    pub fn new(source: Arc<dyn ReleaseSource>) -> Self {
        Self {
            source,
            latest: OnceCell::new(),
        }
    }

    /// Creates a resolver querying the public release endpoint.
    #[must_use]
    pub fn github() -> Self {
        Self::new(Arc::new(GithubReleaseSource::new()))
    }
}

#[async_trait]
impl VersionResolver for LatestReleaseResolver {
    async fn chart_version(&self) -> String {
        let latest = self
            .latest
            .get_or_init(|| async {
                self.source.latest_release().await.map_err(|err| {
                    warn!(error = %err, "failed to get latest release, using embedded chart version");
                    err.to_string()
                })
            })
            .await;
        match latest {
            Ok(version) => version.clone(),
            Err(_) => embedded_chart_version().to_owned(),
        }
    }
}

type HyperClient = Client<HttpsConnector<HttpConnector>, Body>;

fn build_https_client() -> HyperClient {
    let mut roots = RootCertStore::empty();
    roots.add_trust_anchors(TLS_SERVER_ROOTS.iter().map(|anchor| {
        OwnedTrustAnchor::from_subject_spki_name_constraints(
            anchor.subject,
            anchor.spki,
            anchor.name_constraints,
        )
    }));

    let config = ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(roots)
        .with_no_client_auth();

    let mut http = HttpConnector::new();
    http.enforce_http(false);

    let connector = HttpsConnector::from((http, Arc::new(config)));
    Client::builder().build::<_, Body>(connector)
}

#[derive(Deserialize)]
struct LatestRelease {
    tag_name: String,
}

/// Reads the latest release from the GitHub releases API.
pub struct GithubReleaseSource {
    client: HyperClient,
    endpoint: String,
    timeout: Duration,
}

impl std::fmt::Debug for GithubReleaseSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubReleaseSource")
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Default for GithubReleaseSource {
    fn default() -> Self {
        Self::new()
    }
}

impl GithubReleaseSource {
    /// Creates a source for the public release endpoint.
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: build_https_client(),
            endpoint: LATEST_RELEASE_URL.to_owned(),
            timeout: RELEASE_LOOKUP_TIMEOUT,
        }
    }

    /// Overrides the endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Overrides the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl ReleaseSource for GithubReleaseSource {
    async fn latest_release(&self) -> KernelResult<String> {
        let request = Request::get(self.endpoint.as_str())
            .header(USER_AGENT, "ig-mcp-server")
            .header(ACCEPT, "application/vnd.github+json")
            .body(Body::empty())
            .map_err(|err| KernelError::release(format!("failed to build request: {err}")))?;

        let response = timeout(self.timeout, self.client.request(request))
            .await
            .map_err(|_| KernelError::release("request timed out"))?
            .map_err(|err| KernelError::release(format!("failed to get latest release: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(KernelError::release(format!(
                "failed to get latest release, status code: {}",
                status.as_u16()
            )));
        }

        let bytes = timeout(self.timeout, to_bytes(response.into_body()))
            .await
            .map_err(|_| KernelError::release("reading response timed out"))?
            .map_err(|err| KernelError::release(format!("failed to read response: {err}")))?;
        let release: LatestRelease = serde_json::from_slice(&bytes)
            .map_err(|err| KernelError::release(format!("decoding latest release response: {err}")))?;

        let version = release.tag_name.trim_start_matches('v').to_owned();
        debug!(version = %version, "resolved latest release");
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
        outcome: Result<&'static str, &'static str>,
    }

    #[async_trait]
    impl ReleaseSource for CountingSource {
        async fn latest_release(&self) -> KernelResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome
                .map(str::to_owned)
                .map_err(KernelError::release)
        }
    }

    #[tokio::test]
    async fn latest_release_is_looked_up_once() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            outcome: Ok("0.41.0"),
        });
        let resolver = LatestReleaseResolver::new(source.clone());

        assert_eq!(resolver.chart_version().await, "0.41.0");
        assert_eq!(resolver.chart_version().await, "0.41.0");
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_lookup_is_memoised_and_falls_back() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            outcome: Err("rate limited"),
        });
        let resolver = LatestReleaseResolver::new(source.clone());

        assert_eq!(resolver.chart_version().await, embedded_chart_version());
        assert_eq!(resolver.chart_version().await, embedded_chart_version());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn embedded_version_comes_from_the_build_environment() {
        let version = embedded_chart_version();
        assert!(!version.starts_with('v'));
        assert!(!version.is_empty());
        assert_eq!(option_env!("IG_CHART_VERSION"), Some(version));
    }
}
