//! Tool descriptors and the handler seam.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ToolResult;
use crate::hint::ReadOnlyHint;
use crate::schema::InputSchema;

/// Arguments supplied to a tool call.
pub type Arguments = Map<String, Value>;

/// Payload returned to the protocol layer for a tool call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    text: String,
    #[serde(default)]
    is_error: bool,
}

impl ToolResponse {
    /// Creates a successful text response.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    /// Creates an error response shown to the caller.
    #[must_use]
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }

    /// Returns the response text.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.text
    }

    /// Returns `true` for error responses.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.is_error
    }
}

/// Trait implemented by tool executors.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Handles one call with the supplied arguments.
    async fn call(&self, arguments: Arguments) -> ToolResult<ToolResponse>;
}

#[async_trait]
impl<F, Fut> ToolHandler for F
where
    F: Send + Sync + Fn(Arguments) -> Fut,
    Fut: Future<Output = ToolResult<ToolResponse>> + Send,
{
    async fn call(&self, arguments: Arguments) -> ToolResult<ToolResponse> {
        (self)(arguments).await
    }
}

/// A tool as exposed to the protocol layer.
#[derive(Clone)]
pub struct ToolDescriptor {
    name: String,
    description: String,
    input_schema: Value,
    read_only: ReadOnlyHint,
    handler: Arc<dyn ToolHandler>,
}

impl fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("read_only", &self.read_only)
            .finish_non_exhaustive()
    }
}

impl ToolDescriptor {
    /// Creates a tool with an empty object schema and no read-only claim.
    #[must_use]
    pub fn new<H>(name: impl Into<String>, description: impl Into<String>, handler: H) -> Self
    where
        H: ToolHandler + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: InputSchema::new().into_value(),
            read_only: ReadOnlyHint::Unspecified,
            handler: Arc::new(handler),
        }
    }

    /// Sets the input schema.
    #[must_use]
    pub fn with_input_schema(mut self, schema: impl Into<Value>) -> Self {
        self.input_schema = schema.into();
        self
    }

    /// Sets the read-only hint.
    #[must_use]
    pub fn with_read_only(mut self, hint: ReadOnlyHint) -> Self {
        self.read_only = hint;
        self
    }

    /// Returns the tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the description shown to callers.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the JSON schema of the arguments.
    #[must_use]
    pub fn input_schema(&self) -> &Value {
        &self.input_schema
    }

    /// Returns the read-only hint.
    #[must_use]
    pub fn read_only(&self) -> ReadOnlyHint {
        self.read_only
    }

    /// Invokes the handler.
    ///
    /// # Errors
    ///
    /// Propagates any [`ToolError`](crate::ToolError) returned by the handler.
    pub async fn call(&self, arguments: Arguments) -> ToolResult<ToolResponse> {
        self.handler.call(arguments).await
    }
}
