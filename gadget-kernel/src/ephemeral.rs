//! Placeholder tools shown while the gadget backend is not deployed.

use gadget_tools::{Arguments, ToolDescriptor, ToolError, ToolResponse};
use tracing::warn;

use crate::discovery::DiscoveredGadget;

/// Message returned by every placeholder tool.
pub const NOT_DEPLOYED_MESSAGE: &str = "Inspektor Gadget is not deployed, please deploy it using \
     the ig_deploy tool first or if you just deployed it, please restart the ig-mcp-server or MCP \
     gateway to refresh the tool list";

/// Builds one placeholder tool per discovered gadget.
///
/// Tools are named after the last repository path segment of the image;
/// images whose repository name cannot be derived are skipped.
#[must_use]
pub fn ephemeral_tools(gadgets: &[DiscoveredGadget]) -> Vec<ToolDescriptor> {
    gadgets
        .iter()
        .filter_map(|gadget| match gadget.image.repository_name() {
            Ok(name) => Some(ToolDescriptor::new(
                format!("gadget_{}", name.replace(' ', "_")),
                gadget.description.clone(),
                |_args: Arguments| async {
                    Ok::<_, ToolError>(ToolResponse::error(NOT_DEPLOYED_MESSAGE))
                },
            )),
            Err(err) => {
                warn!(image = %gadget.image, error = %err, "failed to extract tool name from image");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gadget_primitives::GadgetRef;
    use gadget_tools::ReadOnlyHint;

    fn gadget(image: &str, description: &str) -> DiscoveredGadget {
        DiscoveredGadget::new(GadgetRef::new(image).unwrap()).with_description(description)
    }

    #[tokio::test]
    async fn stubs_are_named_after_the_repository() {
        let tools = ephemeral_tools(&[
            gadget("ghcr.io/inspektor-gadget/gadget/trace_dns:latest", "Trace DNS"),
            gadget("registry/Bad_Name:latest", "skipped"),
        ]);

        assert_eq!(tools.len(), 1);
        let tool = &tools[0];
        assert_eq!(tool.name(), "gadget_trace_dns");
        assert_eq!(tool.description(), "Trace DNS");
        assert_eq!(tool.read_only(), ReadOnlyHint::Unspecified);

        let response = tool.call(Arguments::new()).await.unwrap();
        assert!(response.is_error());
        assert!(response.content().starts_with("Inspektor Gadget is not deployed"));
    }
}
