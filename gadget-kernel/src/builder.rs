//! Conversion of gadget descriptors into callable tools.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gadget_cache::DescriptorMap;
use gadget_manager::GadgetManager;
use gadget_primitives::{Environment, GadgetDescriptor, GadgetRef, ParamMap};
use gadget_tools::{
    Arguments, InputSchema, ReadOnlyHint, ToolDescriptor, ToolError, ToolHandler, ToolResponse,
    ToolResult,
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{KernelError, KernelResult};
use crate::template::Template;

/// Parameter lowered to half the run duration for foreground runs.
pub const MAP_FETCH_INTERVAL_PARAM: &str = "operator.oci.ebpf.map-fetch-interval";

/// Run duration used when the caller does not pass one.
pub const DEFAULT_RUN_DURATION: Duration = Duration::from_secs(10);

const TOOL_DESCRIPTION: Template = Template::new(
    "{{name}} runs the {{display_name}} gadget in the {{environment}} environment.\n\
     {{description}}\n\
     \n\
     Results are returned as one JSON object per event, wrapped in <results> tags. \
     When the output is too large it is cut and <isTruncated>true</isTruncated> is added.\n\
     \n\
     Fields of each event:\n\
     {{fields}}",
);

const FIELD_ROW: Template = Template::new("- {{field}}: {{field_description}}{{field_values}}");

/// Returns the tool name for a gadget display name.
#[must_use]
pub fn tool_name(name: &str) -> String {
    format!("gadget_{}", name.replace(' ', "_"))
}

/// Builds functional gadget tools from descriptors.
#[derive(Clone)]
pub struct GadgetToolBuilder {
    manager: Arc<dyn GadgetManager>,
    environment: Environment,
}

impl std::fmt::Debug for GadgetToolBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GadgetToolBuilder")
            .field("environment", &self.environment)
            .finish_non_exhaustive()
    }
}

impl GadgetToolBuilder {
    /// Creates a builder whose tools dispatch to `manager`.
    #[must_use]
    pub fn new(manager: Arc<dyn GadgetManager>, environment: Environment) -> Self {
        Self {
            manager,
            environment,
        }
    }

    /// Builds one tool per descriptor, skipping descriptors that cannot be
    /// turned into a tool.
    #[must_use]
    pub fn build_all(&self, descriptors: &DescriptorMap) -> Vec<ToolDescriptor> {
        descriptors
            .iter()
            .filter_map(|(image, descriptor)| match self.build(image, descriptor) {
                Ok(tool) => Some(tool),
                Err(err) => {
                    warn!(image = %image, error = %err, "skipping gadget due to error creating tool");
                    None
                }
            })
            .collect()
    }

    /// Builds the tool for a single descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::ToolBuild`] when the embedded metadata cannot
    /// be decoded or the description cannot be rendered.
    pub fn build(&self, image: &GadgetRef, descriptor: &GadgetDescriptor) -> KernelResult<ToolDescriptor> {
        let build_error = |reason: String| KernelError::ToolBuild {
            image: image.to_string(),
            reason,
        };
        let metadata = descriptor.metadata().map_err(|err| build_error(err.to_string()))?;
        if metadata.name.trim().is_empty() {
            return Err(build_error("gadget metadata has no name".into()));
        }
        let name = tool_name(&metadata.name);
        let description = self
            .describe(&name, &metadata.name, &metadata.description, descriptor)
            .map_err(|err| build_error(format!("generating tool description: {err}")))?;

        let params = descriptor
            .params()
            .iter()
            .fold(InputSchema::new(), |schema, param| {
                schema.string(param.full_key(), param.description())
            });
        let schema = InputSchema::new()
            .nested(
                "params",
                "key-value pairs of parameters to pass to the gadget",
                params,
            )
            .number(
                "duration",
                "Duration in seconds to run the gadget. Use 0 to run in background/continuously.",
            )
            .required("params");

        debug!(name = %name, image = %image, "built gadget tool");
        let handler = GadgetToolHandler {
            manager: Arc::clone(&self.manager),
            image: image.clone(),
            defaults: descriptor.default_params(),
        };
        Ok(ToolDescriptor::new(name, description, handler)
            .with_input_schema(schema)
            .with_read_only(ReadOnlyHint::ReadOnly))
    }

    fn describe(
        &self,
        name: &str,
        display_name: &str,
        description: &str,
        descriptor: &GadgetDescriptor,
    ) -> KernelResult<String> {
        // Only the first data source is described.
        let rows = descriptor
            .data_sources()
            .first()
            .map(|source| source.fields())
            .unwrap_or_default()
            .iter()
            .map(|field| {
                let values = if field.value_hint().is_empty() {
                    String::new()
                } else {
                    format!(" (possible values: {})", field.value_hint())
                };
                let vars = HashMap::from([
                    ("field", field.full_name().to_owned()),
                    ("field_description", field.description().to_owned()),
                    ("field_values", values),
                ]);
                FIELD_ROW.render(&vars)
            })
            .collect::<KernelResult<Vec<_>>>()?;

        let vars = HashMap::from([
            ("name", name.to_owned()),
            ("display_name", display_name.to_owned()),
            ("description", description.to_owned()),
            ("environment", self.environment.to_string()),
            ("fields", rows.join("\n")),
        ]);
        TOOL_DESCRIPTION.render(&vars)
    }
}

/// Renders a duration the way the gadget runtime parses interval values.
fn format_interval(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis == 0 {
        return "0s".into();
    }
    if millis < 1000 {
        return format!("{millis}ms");
    }
    let secs = millis / 1000;
    let frac = millis % 1000;
    if frac == 0 {
        format!("{secs}s")
    } else {
        let frac = format!("{frac:03}");
        format!("{secs}.{}s", frac.trim_end_matches('0'))
    }
}

struct GadgetToolHandler {
    manager: Arc<dyn GadgetManager>,
    image: GadgetRef,
    defaults: ParamMap,
}

impl GadgetToolHandler {
    fn prepare(&self, arguments: &Arguments) -> ToolResult<(ParamMap, Option<Duration>)> {
        let mut params = self.defaults.clone();
        let duration = arguments
            .get("duration")
            .and_then(Value::as_f64)
            .and_then(|secs| Duration::try_from_secs_f64(secs.trunc()).ok())
            .unwrap_or(DEFAULT_RUN_DURATION);
        let background = duration.is_zero();

        if !background {
            if let Some(interval) = params.get_mut(MAP_FETCH_INTERVAL_PARAM) {
                *interval = format_interval(duration / 2);
            }
        }

        if let Some(overrides) = arguments.get("params").and_then(Value::as_object) {
            for (key, value) in overrides {
                let Some(value) = value.as_str() else {
                    return Err(ToolError::invalid_argument(
                        key.clone(),
                        format!("invalid type for parameter {key}: expected string"),
                    ));
                };
                params.insert(key.clone(), value.to_owned());
            }
        }

        Ok((params, (!background).then_some(duration)))
    }
}

#[async_trait]
impl ToolHandler for GadgetToolHandler {
    async fn call(&self, arguments: Arguments) -> ToolResult<ToolResponse> {
        let (params, duration) = self.prepare(&arguments)?;

        let Some(duration) = duration else {
            let id = self
                .manager
                .run_detached(&self.image, params)
                .await
                .map_err(|err| ToolError::execution(err.to_string()))?;
            return Ok(ToolResponse::text(format!(
                "The gadget has been started with ID {id}."
            )));
        };

        debug!(image = %self.image, ?params, ?duration, "running gadget");
        let result = self
            .manager
            .run(&self.image, params, Some(duration))
            .await
            .map_err(|err| ToolError::execution(format!("starting gadget {}: {err}", self.image)))?;
        Ok(ToolResponse::text(result.render()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use bytes::Bytes;
    use gadget_manager::{
        ExecutionResult, GadgetError, GadgetInstance, GadgetResult, ResultGovernor, TruncationMode,
    };
    use gadget_primitives::{
        DESCRIPTION_ANNOTATION, DataSourceDescriptor, FieldDescriptor, InstanceId,
        ParamDescriptor, VALUE_ONE_OF_ANNOTATION,
    };
    use serde_json::json;

    #[derive(Default)]
    struct RecordingManager {
        runs: Mutex<Vec<(ParamMap, Option<Duration>)>>,
        detached: AtomicUsize,
    }

    #[async_trait]
    impl GadgetManager for RecordingManager {
        async fn run(
            &self,
            _image: &GadgetRef,
            params: ParamMap,
            timeout: Option<Duration>,
        ) -> GadgetResult<ExecutionResult> {
            self.runs.lock().unwrap().push((params, timeout));
            Ok(ResultGovernor::default().govern(Bytes::from_static(b"{}\n"), TruncationMode::Full))
        }

        async fn run_detached(&self, _image: &GadgetRef, _params: ParamMap) -> GadgetResult<InstanceId> {
            self.detached.fetch_add(1, Ordering::SeqCst);
            Ok(InstanceId::new("f00d")?)
        }

        async fn get_results(&self, _id: &InstanceId) -> GadgetResult<ExecutionResult> {
            unimplemented!()
        }

        async fn stop(&self, _id: &InstanceId) -> GadgetResult<()> {
            unimplemented!()
        }

        async fn get_info(&self, _image: &GadgetRef) -> GadgetResult<GadgetDescriptor> {
            Err(GadgetError::configuration("not used"))
        }

        async fn get_version(&self) -> GadgetResult<String> {
            Ok("v1".into())
        }

        async fn list_gadgets(&self) -> GadgetResult<Vec<GadgetInstance>> {
            Ok(Vec::new())
        }
    }

    fn image() -> GadgetRef {
        GadgetRef::new("ghcr.io/inspektor-gadget/gadget/trace_dns:latest").unwrap()
    }

    fn descriptor() -> GadgetDescriptor {
        GadgetDescriptor::builder(image().as_str())
            .param(
                ParamDescriptor::new("map-fetch-interval")
                    .with_prefix("operator.oci.ebpf.")
                    .with_default("1s"),
            )
            .param(
                ParamDescriptor::new("namespace")
                    .with_prefix("operator.KubeManager.")
                    .with_description("Filter by namespace"),
            )
            .data_source(
                DataSourceDescriptor::new("dns").with_field(
                    FieldDescriptor::new("qtype")
                        .with_annotation(DESCRIPTION_ANNOTATION, "Query type")
                        .with_annotation(VALUE_ONE_OF_ANNOTATION, "A, AAAA"),
                ),
            )
            .data_source(DataSourceDescriptor::new("other").with_field(FieldDescriptor::new("ignored")))
            .metadata("name: trace dns\ndescription: Trace DNS queries\n")
            .build()
            .unwrap()
    }

    fn build() -> (Arc<RecordingManager>, ToolDescriptor) {
        let manager = Arc::new(RecordingManager::default());
        let builder = GadgetToolBuilder::new(manager.clone(), Environment::Kubernetes);
        let tool = builder.build(&image(), &descriptor()).unwrap();
        (manager, tool)
    }

    fn args(value: Value) -> Arguments {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn tool_shape_follows_descriptor() {
        let (_, tool) = build();

        assert_eq!(tool.name(), "gadget_trace_dns");
        assert_eq!(tool.read_only(), ReadOnlyHint::ReadOnly);
        assert!(tool.description().contains("Trace DNS queries"));
        assert!(tool.description().contains("kubernetes"));
        assert!(tool.description().contains("- qtype: Query type (possible values: A, AAAA)"));
        assert!(!tool.description().contains("ignored"));

        let schema = tool.input_schema();
        assert_eq!(schema["required"], json!(["params"]));
        assert_eq!(schema["properties"]["duration"]["type"], "number");
        let params = &schema["properties"]["params"]["properties"];
        assert_eq!(params["operator.KubeManager.namespace"]["type"], "string");
        assert_eq!(
            params["operator.KubeManager.namespace"]["description"],
            "Filter by namespace"
        );
        assert!(params.get("operator.oci.ebpf.map-fetch-interval").is_some());
    }

    #[tokio::test]
    async fn foreground_run_halves_interval_and_applies_overrides() {
        let (manager, tool) = build();

        let response = tool
            .call(args(json!({
                "duration": 5,
                "params": {"operator.KubeManager.namespace": "kube-system"}
            })))
            .await
            .unwrap();

        assert_eq!(response.content(), "\n<results>{}\n</results>\n");
        let runs = manager.runs.lock().unwrap();
        let (params, timeout) = &runs[0];
        assert_eq!(*timeout, Some(Duration::from_secs(5)));
        assert_eq!(params[MAP_FETCH_INTERVAL_PARAM], "2.5s");
        assert_eq!(params["operator.KubeManager.namespace"], "kube-system");
    }

    #[tokio::test]
    async fn missing_duration_uses_default() {
        let (manager, tool) = build();
        tool.call(Arguments::new()).await.unwrap();

        let runs = manager.runs.lock().unwrap();
        assert_eq!(runs[0].1, Some(DEFAULT_RUN_DURATION));
        assert_eq!(runs[0].0[MAP_FETCH_INTERVAL_PARAM], "5s");
    }

    #[tokio::test]
    async fn zero_duration_runs_detached() {
        let (manager, tool) = build();

        let response = tool.call(args(json!({"duration": 0, "params": {}}))).await.unwrap();

        assert_eq!(response.content(), "The gadget has been started with ID f00d.");
        assert_eq!(manager.detached.load(Ordering::SeqCst), 1);
        assert!(manager.runs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_string_param_names_the_key() {
        let (manager, tool) = build();

        let err = tool
            .call(args(json!({"params": {"operator.KubeManager.namespace": 3}})))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ToolError::InvalidArgument { key, .. } if key == "operator.KubeManager.namespace"
        ));
        assert!(manager.runs.lock().unwrap().is_empty());
    }

    #[test]
    fn bad_metadata_skips_the_tool() {
        let manager = Arc::new(RecordingManager::default());
        let builder = GadgetToolBuilder::new(manager, Environment::Linux);
        let broken = GadgetDescriptor::builder("registry/broken:latest")
            .metadata("name: [")
            .build()
            .unwrap();
        let map: DescriptorMap = [
            (image(), descriptor()),
            (GadgetRef::new("registry/broken:latest").unwrap(), broken),
        ]
        .into_iter()
        .collect();

        let tools = builder.build_all(&map);
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name(), "gadget_trace_dns");
    }

    #[test]
    fn intervals_render_like_runtime_durations() {
        assert_eq!(format_interval(Duration::from_millis(500)), "500ms");
        assert_eq!(format_interval(Duration::from_secs(5)), "5s");
        assert_eq!(format_interval(Duration::from_millis(2500)), "2.5s");
        assert_eq!(format_interval(Duration::from_millis(1250)), "1.25s");
    }
}
