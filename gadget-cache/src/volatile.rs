//! In-memory metadata store.

use std::collections::HashMap;

use async_trait::async_trait;
use gadget_primitives::Environment;
use tokio::sync::RwLock;

use crate::{CacheError, CacheResult, DescriptorMap, MetadataStore};

/// Process-local store; contents are lost on exit.
#[derive(Debug, Default)]
pub struct VolatileMetadataStore {
    inner: RwLock<HashMap<(Environment, String), DescriptorMap>>,
}

impl VolatileMetadataStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for VolatileMetadataStore {
    async fn load(&self, version: &str, environment: Environment) -> CacheResult<DescriptorMap> {
        self.inner
            .read()
            .await
            .get(&(environment, version.to_owned()))
            .cloned()
            .ok_or_else(|| CacheError::VersionNotFound {
                version: version.to_owned(),
            })
    }

    async fn save(
        &self,
        version: &str,
        environment: Environment,
        descriptors: &DescriptorMap,
    ) -> CacheResult<()> {
        self.inner
            .write()
            .await
            .insert((environment, version.to_owned()), descriptors.clone());
        Ok(())
    }
}
