//! JSON schema builder for tool input arguments.

use serde_json::{Map, Value, json};

/// Builder for the object schema describing a tool's arguments.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InputSchema {
    properties: Map<String, Value>,
    required: Vec<String>,
}

impl InputSchema {
    /// Creates an empty object schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a string property.
    #[must_use]
    pub fn string(self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.property(name, "string", description)
    }

    /// Adds a number property.
    #[must_use]
    pub fn number(self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.property(name, "number", description)
    }

    /// Adds a free-form object property.
    #[must_use]
    pub fn object(self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.property(name, "object", description)
    }

    /// Adds an object property whose members are described by `members`.
    #[must_use]
    pub fn nested(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        members: InputSchema,
    ) -> Self {
        self.properties.insert(
            name.into(),
            json!({
                "type": "object",
                "description": description.into(),
                "properties": members.properties,
            }),
        );
        self
    }

    /// Adds a string property restricted to `values`.
    #[must_use]
    pub fn enumeration<I, S>(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        values: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        self.properties.insert(
            name.into(),
            json!({
                "type": "string",
                "description": description.into(),
                "enum": values,
            }),
        );
        self
    }

    /// Marks a property as required.
    #[must_use]
    pub fn required(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.required.contains(&name) {
            self.required.push(name);
        }
        self
    }

    /// Returns `true` if a property named `name` was declared.
    #[must_use]
    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// Renders the schema as a JSON value.
    #[must_use]
    pub fn into_value(self) -> Value {
        let mut schema = Map::new();
        schema.insert("type".into(), Value::from("object"));
        schema.insert("properties".into(), Value::Object(self.properties));
        if !self.required.is_empty() {
            schema.insert("required".into(), Value::from(self.required));
        }
        Value::Object(schema)
    }

    fn property(
        mut self,
        name: impl Into<String>,
        kind: &str,
        description: impl Into<String>,
    ) -> Self {
        let description = description.into();
        let mut property = Map::new();
        property.insert("type".into(), Value::from(kind));
        if !description.is_empty() {
            property.insert("description".into(), Value::from(description));
        }
        self.properties.insert(name.into(), Value::Object(property));
        self
    }
}

impl From<InputSchema> for Value {
    fn from(schema: InputSchema) -> Self {
        schema.into_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_properties_and_required() {
        let schema = InputSchema::new()
            .enumeration("action", "Action to take", ["deploy", "undeploy"])
            .number("duration", "Seconds")
            .string("operator.KubeManager.namespace", "")
            .required("action")
            .required("action")
            .into_value();

        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["action"]));
        assert_eq!(schema["properties"]["action"]["enum"], json!(["deploy", "undeploy"]));
        assert_eq!(schema["properties"]["duration"]["type"], "number");
        assert!(schema["properties"]["operator.KubeManager.namespace"]
            .get("description")
            .is_none());
    }

    #[test]
    fn nested_members_become_properties() {
        let schema = InputSchema::new()
            .nested("params", "Gadget parameters", InputSchema::new().string("a", "first"))
            .into_value();
        assert_eq!(schema["properties"]["params"]["type"], "object");
        assert_eq!(schema["properties"]["params"]["properties"]["a"]["description"], "first");
    }

    #[test]
    fn empty_schema_has_no_required_list() {
        let schema = InputSchema::new().into_value();
        assert!(schema.get("required").is_none());
        assert_eq!(schema["properties"], json!({}));
    }
}
