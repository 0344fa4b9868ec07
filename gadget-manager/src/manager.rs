//! Gadget manager trait and its runtime-backed implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gadget_primitives::{Environment, GadgetDescriptor, GadgetRef, InstanceId, ParamMap};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::capture::OutputCapture;
use crate::error::{GadgetError, GadgetResult};
use crate::governor::{ExecutionResult, ResultGovernor, TruncationMode};
use crate::instance::GadgetInstance;
use crate::runtime::{GadgetRuntime, RecordSink, RunRequest};

/// Creator recorded on detached executions started by this server.
pub const CREATED_BY: &str = "ig-mcp-server";

/// Upper bound for attaching to a running instance.
pub const ATTACH_TIMEOUT: Duration = Duration::from_secs(5);

/// How long output is collected once attached to a running instance.
pub const COLLECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Operations for running and inspecting gadgets.
#[async_trait]
pub trait GadgetManager: Send + Sync {
    /// Runs a gadget to completion, or until `timeout` elapses when set,
    /// returning its captured output.
    async fn run(
        &self,
        image: &GadgetRef,
        params: ParamMap,
        timeout: Option<Duration>,
    ) -> GadgetResult<ExecutionResult>;

    /// Starts a gadget in the background and returns its identifier.
    async fn run_detached(&self, image: &GadgetRef, params: ParamMap) -> GadgetResult<InstanceId>;

    /// Samples the output a running instance currently produces.
    async fn get_results(&self, id: &InstanceId) -> GadgetResult<ExecutionResult>;

    /// Stops a running instance.
    async fn stop(&self, id: &InstanceId) -> GadgetResult<()>;

    /// Fetches the descriptor of an image.
    async fn get_info(&self, image: &GadgetRef) -> GadgetResult<GadgetDescriptor>;

    /// Returns the version reported by the backend.
    async fn get_version(&self) -> GadgetResult<String>;

    /// Lists running and detached instances.
    async fn list_gadgets(&self) -> GadgetResult<Vec<GadgetInstance>>;
}

/// Settings validated when a [`RemoteGadgetManager`] is constructed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ManagerConfig {
    environment: Environment,
    remote_address: Option<String>,
}

impl ManagerConfig {
    /// Creates a configuration for the supplied environment.
    #[must_use]
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            remote_address: None,
        }
    }

    /// Sets the address of a Linux gadget daemon.
    #[must_use]
    pub fn with_remote_address(mut self, address: impl Into<String>) -> Self {
        self.remote_address = Some(address.into());
        self
    }

    /// Returns the target environment.
    #[must_use]
    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Returns the configured remote address.
    #[must_use]
    pub fn remote_address(&self) -> Option<&str> {
        self.remote_address.as_deref()
    }

    fn validate(&self) -> GadgetResult<()> {
        let has_address = self
            .remote_address
            .as_deref()
            .is_some_and(|address| !address.trim().is_empty());
        if self.environment == Environment::Linux && !has_address {
            return Err(GadgetError::configuration(
                "a remote address is required for the linux environment",
            ));
        }
        Ok(())
    }
}

/// [`GadgetManager`] backed by a [`GadgetRuntime`].
pub struct RemoteGadgetManager {
    runtime: Arc<dyn GadgetRuntime>,
    config: ManagerConfig,
    governor: ResultGovernor,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for RemoteGadgetManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteGadgetManager")
            .field("config", &self.config)
            .field("governor", &self.governor)
            .field("shutdown", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl RemoteGadgetManager {
    /// Creates a manager over the supplied runtime.
    ///
    /// # Errors
    ///
    /// Returns [`GadgetError::Configuration`] when the linux environment is
    /// selected without a remote address.
    pub fn new(runtime: Arc<dyn GadgetRuntime>, config: ManagerConfig) -> GadgetResult<Self> {
        config.validate()?;
        Ok(Self {
            runtime,
            config,
            governor: ResultGovernor::default(),
            shutdown: CancellationToken::new(),
        })
    }

    /// Replaces the shutdown token, typically with a child of the process token.
    #[must_use]
    pub fn with_shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Overrides the output governor.
    #[must_use]
    pub fn with_governor(mut self, governor: ResultGovernor) -> Self {
        self.governor = governor;
        self
    }

    /// Returns the validated configuration.
    #[must_use]
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Cancels every in-flight synchronous execution.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) was called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    async fn execute(
        &self,
        operation: &'static str,
        request: RunRequest,
        sink: Option<Arc<dyn RecordSink>>,
    ) -> GadgetResult<()> {
        let cancel = self.shutdown.child_token();
        tokio::select! {
            biased;
            () = self.shutdown.cancelled() => Err(GadgetError::Cancelled { operation }),
            result = self.runtime.run(request, sink, cancel) => {
                result.map_err(|source| GadgetError::backend(operation, source))
            }
        }
    }
}

#[async_trait]
impl GadgetManager for RemoteGadgetManager {
    async fn run(
        &self,
        image: &GadgetRef,
        params: ParamMap,
        timeout: Option<Duration>,
    ) -> GadgetResult<ExecutionResult> {
        debug!(image = %image, ?timeout, "running gadget");
        let capture = Arc::new(OutputCapture::new());
        let request = RunRequest::image(image.clone())
            .with_params(params)
            .with_timeout(timeout);
        let sink: Arc<dyn RecordSink> = capture.clone();
        self.execute("running gadget", request, Some(sink)).await?;

        Ok(self.governor.govern(capture.take(), TruncationMode::Full))
    }

    async fn run_detached(&self, image: &GadgetRef, params: ParamMap) -> GadgetResult<InstanceId> {
        let id = InstanceId::random();
        debug!(image = %image, gadget_id = %id, "starting detached gadget");
        let request = RunRequest::image(image.clone())
            .with_params(params)
            .detached(id.clone())
            .with_tag(format!("createdBy={CREATED_BY}"));
        self.execute("running gadget", request, None).await?;
        Ok(id)
    }

    async fn get_results(&self, id: &InstanceId) -> GadgetResult<ExecutionResult> {
        const OPERATION: &str = "attaching to gadget";

        let capture = Arc::new(OutputCapture::new());
        let request = RunRequest::attach(id.clone()).with_timeout(Some(COLLECT_TIMEOUT));
        let sink: Arc<dyn RecordSink> = capture.clone();
        match tokio::time::timeout(ATTACH_TIMEOUT, self.execute(OPERATION, request, Some(sink))).await {
            Ok(result) => result?,
            Err(_) => debug!(gadget_id = %id, "attach timed out, returning partial output"),
        }

        Ok(self.governor.govern(capture.take(), TruncationMode::Latest))
    }

    async fn stop(&self, id: &InstanceId) -> GadgetResult<()> {
        debug!(gadget_id = %id, "stopping gadget");
        self.runtime
            .remove_instance(id)
            .await
            .map_err(|source| GadgetError::backend("stopping gadget", source))
    }

    async fn get_info(&self, image: &GadgetRef) -> GadgetResult<GadgetDescriptor> {
        const OPERATION: &str = "get gadget info";

        tokio::select! {
            biased;
            () = self.shutdown.cancelled() => Err(GadgetError::Cancelled { operation: OPERATION }),
            result = self.runtime.gadget_info(image, self.shutdown.child_token()) => {
                result.map_err(|source| GadgetError::backend(OPERATION, source))
            }
        }
    }

    async fn get_version(&self) -> GadgetResult<String> {
        self.runtime
            .server_version()
            .await
            .map_err(|source| GadgetError::backend("getting info", source))
    }

    async fn list_gadgets(&self) -> GadgetResult<Vec<GadgetInstance>> {
        let instances = self
            .runtime
            .list_instances()
            .await
            .map_err(|source| GadgetError::backend("listing gadgets", source))?;
        Ok(instances.into_iter().map(GadgetInstance::from_runtime).collect())
    }
}
