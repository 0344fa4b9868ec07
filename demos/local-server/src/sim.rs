//! In-process stand-ins for the gadget daemon and the cluster.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use ig_mcp_server::kernel::{ClusterClient, KernelResult};
use ig_mcp_server::manager::{
    GadgetRuntime, Record, RecordSink, RunRequest, RunTarget, RuntimeError, RuntimeInstance,
    RuntimeResult,
};
use ig_mcp_server::primitives::{
    DESCRIPTION_ANNOTATION, DataSourceDescriptor, FieldDescriptor, GadgetDescriptor, GadgetRef,
    InstanceId, ParamDescriptor, VALUE_ONE_OF_ANNOTATION,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const EMIT_INTERVAL: Duration = Duration::from_millis(200);
const ATTACH_RECORDS: u64 = 3;

/// Gadget daemon emitting synthetic events.
#[derive(Debug, Default)]
pub struct SimulatedRuntime {
    instances: Mutex<Vec<RuntimeInstance>>,
    sequence: AtomicU64,
}

impl SimulatedRuntime {
    fn emit(&self, sink: &dyn RecordSink, source: &str) {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        sink.on_record(Record::new(
            source,
            json!({
                "seq": seq,
                "k8s": {"namespace": "default", "podName": format!("demo-{}", seq % 3)},
                "comm": "curl",
            }),
        ));
    }

    async fn stream(
        &self,
        sink: &dyn RecordSink,
        source: &str,
        limit: Option<Duration>,
        cancel: &CancellationToken,
    ) {
        let deadline = limit.map(|limit| tokio::time::Instant::now() + limit);
        loop {
            self.emit(sink, source);
            let tick = tokio::time::sleep(EMIT_INTERVAL);
            tokio::select! {
                () = cancel.cancelled() => return,
                () = tick => {}
            }
            if deadline.is_some_and(|deadline| tokio::time::Instant::now() >= deadline) {
                return;
            }
        }
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}

#[async_trait]
impl GadgetRuntime for SimulatedRuntime {
    async fn run(
        &self,
        request: RunRequest,
        sink: Option<Arc<dyn RecordSink>>,
        cancel: CancellationToken,
    ) -> RuntimeResult<()> {
        if let Some(id) = request.detach_id() {
            let RunTarget::Image(image) = request.target() else {
                return Err(RuntimeError::remote("only images can be detached"));
            };
            self.instances
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(RuntimeInstance {
                    id: id.to_string(),
                    image_name: image.to_string(),
                    tags: request.tags().to_vec(),
                    param_values: request.params().clone(),
                    time_created: unix_now(),
                });
            debug!(gadget_id = %id, "simulated detached run");
            return Ok(());
        }

        let Some(sink) = sink else {
            return Ok(());
        };
        match request.target() {
            RunTarget::Image(image) => {
                let source = image.repository_name().unwrap_or("events");
                self.stream(sink.as_ref(), source, request.timeout(), &cancel).await;
            }
            RunTarget::Instance(id) => {
                let known = self
                    .instances
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .iter()
                    .any(|instance| instance.id == id.as_str());
                if !known {
                    return Err(RuntimeError::remote(format!("gadget instance {id} not found")));
                }
                for _ in 0..ATTACH_RECORDS {
                    self.emit(sink.as_ref(), "attached");
                }
            }
        }
        Ok(())
    }

    async fn gadget_info(
        &self,
        image: &GadgetRef,
        _cancel: CancellationToken,
    ) -> RuntimeResult<GadgetDescriptor> {
        let name = image
            .repository_name()
            .map_err(|err| RuntimeError::remote(err.to_string()))?;
        GadgetDescriptor::builder(image.as_str())
            .param(
                ParamDescriptor::new("map-fetch-interval")
                    .with_prefix("operator.oci.ebpf.")
                    .with_default("1s")
                    .with_description("Interval to fetch map contents"),
            )
            .param(
                ParamDescriptor::new("namespace")
                    .with_prefix("operator.KubeManager.")
                    .with_description("Show only data from pods in a given namespace"),
            )
            .data_source(
                DataSourceDescriptor::new(name)
                    .with_field(
                        FieldDescriptor::new("k8s.namespace")
                            .with_annotation(DESCRIPTION_ANNOTATION, "Kubernetes namespace"),
                    )
                    .with_field(
                        FieldDescriptor::new("comm")
                            .with_annotation(DESCRIPTION_ANNOTATION, "Process name")
                            .with_annotation(VALUE_ONE_OF_ANNOTATION, "curl, wget"),
                    ),
            )
            .metadata(format!(
                "name: {}\ndescription: Simulated {} gadget\n",
                name.replace('_', " "),
                name
            ))
            .build()
            .map_err(|err| RuntimeError::remote(err.to_string()))
    }

    async fn remove_instance(&self, id: &InstanceId) -> RuntimeResult<()> {
        let mut instances = self.instances.lock().unwrap_or_else(PoisonError::into_inner);
        let before = instances.len();
        instances.retain(|instance| instance.id != id.as_str());
        if instances.len() == before {
            return Err(RuntimeError::remote(format!("gadget instance {id} not found")));
        }
        Ok(())
    }

    async fn list_instances(&self) -> RuntimeResult<Vec<RuntimeInstance>> {
        Ok(self
            .instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn server_version(&self) -> RuntimeResult<String> {
        Ok("v0.41.0-sim".into())
    }
}

/// Cluster where the gadget chart can be installed instantly.
#[derive(Debug, Default)]
pub struct SimulatedCluster {
    deployed: AtomicBool,
}

#[async_trait]
impl ClusterClient for SimulatedCluster {
    async fn pod_namespaces(&self, _selector: &str) -> KernelResult<Vec<String>> {
        if self.deployed.load(Ordering::SeqCst) {
            Ok(vec!["gadget".into()])
        } else {
            Ok(Vec::new())
        }
    }

    async fn install_chart(&self, chart: &str, release: &str, namespace: &str) -> KernelResult<String> {
        self.deployed.store(true, Ordering::SeqCst);
        Ok(format!("release {release} installed in namespace {namespace} from {chart}"))
    }

    async fn uninstall_chart(&self, release: &str, namespace: &str) -> KernelResult<String> {
        self.deployed.store(false, Ordering::SeqCst);
        Ok(format!("release {release} uninstalled from namespace {namespace}"))
    }

    async fn upgrade_chart(&self, chart: &str, release: &str, _namespace: &str) -> KernelResult<String> {
        Ok(format!("release {release} upgraded to {chart}"))
    }

    async fn release_exists(&self, _release: &str, _namespace: &str) -> KernelResult<bool> {
        Ok(self.deployed.load(Ordering::SeqCst))
    }
}
