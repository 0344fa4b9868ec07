//! The `ig_gadgets` tool managing detached gadget instances.

use std::sync::Arc;

use async_trait::async_trait;
use gadget_manager::GadgetManager;
use gadget_primitives::InstanceId;
use gadget_tools::{
    Arguments, InputSchema, ReadOnlyHint, ToolDescriptor, ToolHandler, ToolResponse, ToolResult,
};
use serde_json::Value;
use tracing::debug;

use crate::action::{ACTION_ARG, Action, InstanceAction, parse_action};

/// Name of the running-instance tool.
pub const INSTANCE_TOOL_NAME: &str = "ig_gadgets";

const GADGET_ID_ARG: &str = "gadget_id";

/// Builds the running-instance tool dispatching to `manager`.
#[must_use]
pub fn instance_tool(manager: Arc<dyn GadgetManager>) -> ToolDescriptor {
    let schema = InputSchema::new()
        .enumeration(
            ACTION_ARG,
            "Lifecycle action to perform: list_running_gadgets(list running gadgets), \
             stop_gadget(stop a running gadget using its ID), get_results(get results of a \
             running gadget using its ID, only available before stopping it)",
            InstanceAction::ALL.iter().map(|action| action.as_str()),
        )
        .string(
            GADGET_ID_ARG,
            "ID of the gadget to stop or get results from, required for stop_gadget and get_results",
        );
    ToolDescriptor::new(
        INSTANCE_TOOL_NAME,
        "Manage running gadgets",
        InstanceTool { manager },
    )
    .with_input_schema(schema)
    .with_read_only(ReadOnlyHint::Mutating)
}

struct InstanceTool {
    manager: Arc<dyn GadgetManager>,
}

impl InstanceTool {
    async fn list(&self) -> ToolResponse {
        debug!("listing gadgets");
        let instances = match self.manager.list_gadgets().await {
            Ok(instances) => instances,
            Err(err) => return ToolResponse::error(format!("Failed to list gadgets: {err}")),
        };
        if instances.is_empty() {
            return ToolResponse::text("No running gadgets found");
        }
        match serde_json::to_string(&instances) {
            Ok(json) => ToolResponse::text(json),
            Err(err) => ToolResponse::error(format!("Failed to marshal gadgets to JSON: {err}")),
        }
    }

    async fn results(&self, id: &InstanceId) -> ToolResponse {
        debug!(gadget_id = %id, "getting gadget results");
        match self.manager.get_results(id).await {
            Ok(result) => ToolResponse::text(result.render()),
            Err(err) => ToolResponse::error(format!("Failed to get gadget results: {err}")),
        }
    }

    async fn stop(&self, id: &InstanceId) -> ToolResponse {
        debug!(gadget_id = %id, "stopping gadget");
        match self.manager.stop(id).await {
            Ok(()) => ToolResponse::text(format!("Gadget with ID {id} has been stopped")),
            Err(err) => ToolResponse::error(format!("Failed to stop gadget: {err}")),
        }
    }
}

#[async_trait]
impl ToolHandler for InstanceTool {
    async fn call(&self, arguments: Arguments) -> ToolResult<ToolResponse> {
        let action = match parse_action::<InstanceAction>(&arguments) {
            Ok(action) => action,
            Err(response) => return Ok(response),
        };
        if action == InstanceAction::ListRunningGadgets {
            return Ok(self.list().await);
        }

        let id = arguments
            .get(GADGET_ID_ARG)
            .and_then(Value::as_str)
            .and_then(|id| InstanceId::new(id).ok());
        let Some(id) = id else {
            return Ok(ToolResponse::error(format!(
                "A gadget_id must be specified for {action}"
            )));
        };

        let response = match action {
            InstanceAction::GetResults => self.results(&id).await,
            InstanceAction::StopGadget => self.stop(&id).await,
            InstanceAction::ListRunningGadgets => self.list().await,
        };
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use bytes::Bytes;
    use chrono::DateTime;
    use gadget_manager::{
        ExecutionResult, GadgetError, GadgetInstance, GadgetResult, ResultGovernor, TruncationMode,
    };
    use gadget_primitives::{GadgetDescriptor, GadgetRef, ParamMap};
    use serde_json::json;

    #[derive(Default)]
    struct InstanceManager {
        instances: Vec<GadgetInstance>,
        stopped: Mutex<Vec<String>>,
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl GadgetManager for InstanceManager {
        async fn run(&self, _: &GadgetRef, _: ParamMap, _: Option<Duration>) -> GadgetResult<ExecutionResult> {
            unimplemented!()
        }

        async fn run_detached(&self, _: &GadgetRef, _: ParamMap) -> GadgetResult<InstanceId> {
            unimplemented!()
        }

        async fn get_results(&self, id: &InstanceId) -> GadgetResult<ExecutionResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(GadgetError::configuration("no such instance"));
            }
            let output = Bytes::from(format!("{{\"id\":\"{id}\"}}\n"));
            Ok(ResultGovernor::default().govern(output, TruncationMode::Latest))
        }

        async fn stop(&self, id: &InstanceId) -> GadgetResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.stopped.lock().unwrap().push(id.to_string());
            Ok(())
        }

        async fn get_info(&self, _: &GadgetRef) -> GadgetResult<GadgetDescriptor> {
            unimplemented!()
        }

        async fn get_version(&self) -> GadgetResult<String> {
            unimplemented!()
        }

        async fn list_gadgets(&self) -> GadgetResult<Vec<GadgetInstance>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.instances.clone())
        }
    }

    fn args(value: Value) -> Arguments {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn id_is_required_before_dispatch() {
        let manager = Arc::new(InstanceManager::default());
        let tool = instance_tool(manager.clone());

        for action in ["get_results", "stop_gadget"] {
            let response = tool
                .call(args(json!({"action": action, "gadget_id": "  "})))
                .await
                .unwrap();
            assert!(response.is_error());
            assert_eq!(
                response.content(),
                format!("A gadget_id must be specified for {action}")
            );
        }
        assert_eq!(manager.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn list_renders_instances_as_json() {
        let empty = instance_tool(Arc::new(InstanceManager::default()));
        let response = empty
            .call(args(json!({"action": "list_running_gadgets"})))
            .await
            .unwrap();
        assert_eq!(response.content(), "No running gadgets found");

        let manager = InstanceManager {
            instances: vec![GadgetInstance {
                id: "abc".into(),
                gadget_image: "trace_dns".into(),
                params: String::new(),
                created_by: "ig-mcp-server".into(),
                started_at: DateTime::from_timestamp(0, 0).unwrap(),
            }],
            ..InstanceManager::default()
        };
        let tool = instance_tool(Arc::new(manager));
        let response = tool
            .call(args(json!({"action": "list_running_gadgets"})))
            .await
            .unwrap();
        let listed: Value = serde_json::from_str(response.content()).unwrap();
        assert_eq!(listed[0]["id"], "abc");
        assert_eq!(listed[0]["gadgetImage"], "trace_dns");
        assert_eq!(listed[0]["createdBy"], "ig-mcp-server");
    }

    #[tokio::test]
    async fn stop_and_results_dispatch_by_id() {
        let manager = Arc::new(InstanceManager::default());
        let tool = instance_tool(manager.clone());

        let stopped = tool
            .call(args(json!({"action": "stop_gadget", "gadget_id": "f00d"})))
            .await
            .unwrap();
        assert_eq!(stopped.content(), "Gadget with ID f00d has been stopped");
        assert_eq!(*manager.stopped.lock().unwrap(), ["f00d"]);

        let results = tool
            .call(args(json!({"action": "get_results", "gadget_id": "f00d"})))
            .await
            .unwrap();
        assert_eq!(results.content(), "\n<results>{\"id\":\"f00d\"}\n</results>\n");
    }

    #[tokio::test]
    async fn backend_failures_are_error_responses() {
        let tool = instance_tool(Arc::new(InstanceManager {
            fail: true,
            ..InstanceManager::default()
        }));

        let response = tool
            .call(args(json!({"action": "get_results", "gadget_id": "f00d"})))
            .await
            .unwrap();
        assert!(response.is_error());
        assert!(response.content().starts_with("Failed to get gadget results:"));
    }
}
