//! Remote gadget runtime abstraction.
//!
//! The transport to the runtime (gRPC, Kubernetes proxy, local socket) lives
//! behind [`GadgetRuntime`]; everything in this crate only needs the calls
//! below.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gadget_primitives::{GadgetDescriptor, GadgetRef, InstanceId, ParamMap};
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Result alias used by runtime implementations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors reported by a runtime implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// The referenced gadget instance does not exist.
    #[error("gadget instance `{id}` not found")]
    NotFound {
        /// Identifier that was looked up.
        id: String,
    },

    /// The runtime could not be reached or initialised.
    #[error("runtime unavailable: {reason}")]
    Unavailable {
        /// Additional context about the failure.
        reason: String,
    },

    /// The runtime reported a failure for the request.
    #[error("{reason}")]
    Remote {
        /// Message returned by the runtime.
        reason: String,
    },
}

impl RuntimeError {
    /// Convenience constructor for remote failures.
    #[must_use]
    pub fn remote(reason: impl Into<String>) -> Self {
        Self::Remote {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for connectivity failures.
    #[must_use]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }
}

/// What a [`RunRequest`] executes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunTarget {
    /// Start a new execution of the image.
    Image(GadgetRef),
    /// Attach to an existing (usually detached) execution.
    Instance(InstanceId),
}

/// A request to run or attach to a gadget.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunRequest {
    target: RunTarget,
    params: ParamMap,
    timeout: Option<Duration>,
    detach: Option<InstanceId>,
    tags: Vec<String>,
}

impl RunRequest {
    /// Creates a request that starts the supplied image.
    #[must_use]
    pub fn image(image: GadgetRef) -> Self {
        Self::new(RunTarget::Image(image))
    }

    /// Creates a request that attaches to a running instance.
    #[must_use]
    pub fn attach(id: InstanceId) -> Self {
        Self::new(RunTarget::Instance(id))
    }

    fn new(target: RunTarget) -> Self {
        Self {
            target,
            params: ParamMap::new(),
            timeout: None,
            detach: None,
            tags: Vec::new(),
        }
    }

    /// Sets the gadget parameters.
    #[must_use]
    pub fn with_params(mut self, params: ParamMap) -> Self {
        self.params = params;
        self
    }

    /// Bounds how long the runtime keeps the execution (or attachment) open.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Marks the execution as detached under the supplied identifier.
    #[must_use]
    pub fn detached(mut self, id: InstanceId) -> Self {
        self.detach = Some(id);
        self
    }

    /// Adds a `key=value` tag recorded by the runtime with the instance.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Returns the run target.
    #[must_use]
    pub fn target(&self) -> &RunTarget {
        &self.target
    }

    /// Returns the gadget parameters.
    #[must_use]
    pub fn params(&self) -> &ParamMap {
        &self.params
    }

    /// Returns the execution timeout, `None` meaning unbounded.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Returns the instance identifier when the run is detached.
    #[must_use]
    pub fn detach_id(&self) -> Option<&InstanceId> {
        self.detach.as_ref()
    }

    /// Returns the instance tags.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }
}

/// A structured record emitted by one data source of a running gadget.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    data_source: String,
    payload: Value,
}

impl Record {
    /// Creates a record for the given data source.
    #[must_use]
    pub fn new(data_source: impl Into<String>, payload: Value) -> Self {
        Self {
            data_source: data_source.into(),
            payload,
        }
    }

    /// Returns the emitting data source.
    #[must_use]
    pub fn data_source(&self) -> &str {
        &self.data_source
    }

    /// Returns the record payload.
    #[must_use]
    pub fn payload(&self) -> &Value {
        &self.payload
    }
}

/// Subscriber receiving records while a gadget runs.
///
/// Runtimes may deliver records from several data sources of one execution
/// concurrently, so implementations synchronise internally.
pub trait RecordSink: Send + Sync {
    /// Receives one record.
    fn on_record(&self, record: Record);
}

/// A running gadget instance as reported by the runtime.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RuntimeInstance {
    /// Instance identifier.
    pub id: String,
    /// Image the instance was started from.
    pub image_name: String,
    /// Tags recorded at start, in `key=value` form.
    pub tags: Vec<String>,
    /// Effective parameter values.
    pub param_values: BTreeMap<String, String>,
    /// Creation time as seconds since the Unix epoch.
    pub time_created: i64,
}

/// Operations offered by a remote gadget runtime.
#[async_trait]
pub trait GadgetRuntime: Send + Sync {
    /// Runs (or attaches to) a gadget, delivering records to `sink` until the
    /// request's timeout elapses, the gadget completes, or `cancel` fires.
    /// Detached requests return as soon as the runtime has scheduled them.
    async fn run(
        &self,
        request: RunRequest,
        sink: Option<Arc<dyn RecordSink>>,
        cancel: CancellationToken,
    ) -> RuntimeResult<()>;

    /// Fetches the descriptor of an image.
    async fn gadget_info(
        &self,
        image: &GadgetRef,
        cancel: CancellationToken,
    ) -> RuntimeResult<GadgetDescriptor>;

    /// Removes a gadget instance, stopping it.
    async fn remove_instance(&self, id: &InstanceId) -> RuntimeResult<()>;

    /// Lists the gadget instances currently known to the runtime.
    async fn list_instances(&self) -> RuntimeResult<Vec<RuntimeInstance>>;

    /// Returns the version reported by the runtime server.
    async fn server_version(&self) -> RuntimeResult<String>;
}
