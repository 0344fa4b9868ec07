//! Caller-facing view of a running gadget instance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::runtime::RuntimeInstance;

const CREATED_BY_TAG: &str = "createdBy=";

/// A detached or running gadget execution as listed to callers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GadgetInstance {
    /// Instance identifier.
    pub id: String,
    /// Image the instance was started from.
    pub gadget_image: String,
    /// Non-empty parameter values rendered as `key="value"` pairs.
    pub params: String,
    /// Creator recorded in the instance tags, if any.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub created_by: String,
    /// Start time of the instance.
    pub started_at: DateTime<Utc>,
}

impl GadgetInstance {
    /// Builds the caller-facing view of a runtime instance.
    #[must_use]
    pub fn from_runtime(instance: RuntimeInstance) -> Self {
        let created_by = instance
            .tags
            .iter()
            .find_map(|tag| tag.strip_prefix(CREATED_BY_TAG))
            .unwrap_or_default()
            .to_owned();

        let params = instance
            .param_values
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(key, value)| format!("{key}={value:?}"))
            .collect::<Vec<_>>()
            .join(",");

        Self {
            id: instance.id,
            gadget_image: instance.image_name,
            params,
            created_by,
            started_at: DateTime::from_timestamp(instance.time_created, 0).unwrap_or_default(),
        }
    }
}

impl From<RuntimeInstance> for GadgetInstance {
    fn from(instance: RuntimeInstance) -> Self {
        Self::from_runtime(instance)
    }
}
