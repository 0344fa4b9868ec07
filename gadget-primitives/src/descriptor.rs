//! Remote-supplied gadget descriptors.
//!
//! A descriptor is fetched once per image and replaced wholesale on re-fetch;
//! nothing in the workspace mutates one field by field.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Field annotation holding a human-readable description.
pub const DESCRIPTION_ANNOTATION: &str = "description";
/// Field annotation listing the values a field can take.
pub const VALUE_ONE_OF_ANNOTATION: &str = "value.one-of";

/// Parameter map passed to the backend, keyed by `prefix + key`.
pub type ParamMap = BTreeMap<String, String>;

/// Schema of a gadget as reported by the remote backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GadgetDescriptor {
    image_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    params: Vec<ParamDescriptor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    data_sources: Vec<DataSourceDescriptor>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    metadata: String,
}

impl GadgetDescriptor {
    /// Starts building a descriptor for the supplied image.
    #[must_use]
    pub fn builder(image_name: impl Into<String>) -> GadgetDescriptorBuilder {
        GadgetDescriptorBuilder {
            image_name: image_name.into(),
            params: Vec::new(),
            data_sources: Vec::new(),
            metadata: String::new(),
        }
    }

    /// Returns the image name the backend resolved for this gadget.
    #[must_use]
    pub fn image_name(&self) -> &str {
        &self.image_name
    }

    /// Returns the declared parameters.
    #[must_use]
    pub fn params(&self) -> &[ParamDescriptor] {
        &self.params
    }

    /// Returns the declared data sources.
    #[must_use]
    pub fn data_sources(&self) -> &[DataSourceDescriptor] {
        &self.data_sources
    }

    /// Returns the raw embedded metadata document (YAML).
    #[must_use]
    pub fn raw_metadata(&self) -> &str {
        &self.metadata
    }

    /// Decodes the embedded metadata document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Metadata`] if the document is not valid YAML or does
    /// not match the expected shape.
    pub fn metadata(&self) -> Result<GadgetMetadata> {
        Ok(serde_yaml::from_str(&self.metadata)?)
    }

    /// Returns the default value of every declared parameter keyed by
    /// `prefix + key`.
    #[must_use]
    pub fn default_params(&self) -> ParamMap {
        self.params
            .iter()
            .map(|param| (param.full_key(), param.default_value().to_owned()))
            .collect()
    }
}

/// Builder for [`GadgetDescriptor`].
#[derive(Debug)]
pub struct GadgetDescriptorBuilder {
    image_name: String,
    params: Vec<ParamDescriptor>,
    data_sources: Vec<DataSourceDescriptor>,
    metadata: String,
}

impl GadgetDescriptorBuilder {
    /// Adds a parameter declaration.
    #[must_use]
    pub fn param(mut self, param: ParamDescriptor) -> Self {
        self.params.push(param);
        self
    }

    /// Adds a data source declaration.
    #[must_use]
    pub fn data_source(mut self, data_source: DataSourceDescriptor) -> Self {
        self.data_sources.push(data_source);
        self
    }

    /// Sets the embedded metadata document.
    #[must_use]
    pub fn metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = metadata.into();
        self
    }

    /// Finalises the descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDescriptor`] if the image name is empty.
    pub fn build(self) -> Result<GadgetDescriptor> {
        if self.image_name.trim().is_empty() {
            return Err(Error::InvalidDescriptor {
                reason: "image name cannot be empty".into(),
            });
        }
        Ok(GadgetDescriptor {
            image_name: self.image_name,
            params: self.params,
            data_sources: self.data_sources,
            metadata: self.metadata,
        })
    }
}

/// A gadget parameter declaration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamDescriptor {
    key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    prefix: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    default_value: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    description: String,
}

impl ParamDescriptor {
    /// Creates a parameter with the given key and no prefix.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    /// Sets the key prefix, e.g. `operator.oci.ebpf.`.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn with_default(mut self, default_value: impl Into<String>) -> Self {
        self.default_value = default_value.into();
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Returns the unprefixed key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the key prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the key under which the backend expects this parameter.
    #[must_use]
    pub fn full_key(&self) -> String {
        format!("{}{}", self.prefix, self.key)
    }

    /// Returns the default value.
    #[must_use]
    pub fn default_value(&self) -> &str {
        &self.default_value
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }
}

/// A data source emitted by a gadget.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceDescriptor {
    name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    fields: Vec<FieldDescriptor>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    annotations: BTreeMap<String, String>,
}

impl DataSourceDescriptor {
    /// Creates a data source with no fields.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Adds a field declaration.
    #[must_use]
    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Adds an annotation.
    #[must_use]
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// Returns the data source name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared fields.
    #[must_use]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Returns the annotation stored under `key`.
    #[must_use]
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }
}

/// A field of a data source.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    full_name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    annotations: BTreeMap<String, String>,
}

impl FieldDescriptor {
    /// Creates a field with no annotations.
    #[must_use]
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            annotations: BTreeMap::new(),
        }
    }

    /// Adds an annotation.
    #[must_use]
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// Returns the fully-qualified field name.
    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Returns the field description annotation, empty if absent.
    #[must_use]
    pub fn description(&self) -> &str {
        self.annotations
            .get(DESCRIPTION_ANNOTATION)
            .map_or("", String::as_str)
    }

    /// Returns the value hint annotation, empty if absent.
    #[must_use]
    pub fn value_hint(&self) -> &str {
        self.annotations
            .get(VALUE_ONE_OF_ANNOTATION)
            .map_or("", String::as_str)
    }
}

/// Structured metadata embedded in a gadget image.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GadgetMetadata {
    /// Gadget display name.
    #[serde(default)]
    pub name: String,
    /// Gadget description.
    #[serde(default)]
    pub description: String,
}
