//! Descriptor cache for gadget metadata.
//!
//! Descriptors are stored per runtime version and environment so a restart
//! against the same backend can skip the remote fetch round entirely.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod file;
mod volatile;

use std::collections::BTreeMap;

use async_trait::async_trait;
use gadget_primitives::{Environment, GadgetDescriptor, GadgetRef};

pub use error::{CacheError, CacheResult};
pub use file::{CACHE_DIR_NAME, FileMetadataStore};
pub use volatile::VolatileMetadataStore;

/// Descriptors keyed by the image they were fetched for.
pub type DescriptorMap = BTreeMap<GadgetRef, GadgetDescriptor>;

/// Store persisting descriptor maps keyed by (runtime version, environment).
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Loads the descriptors saved for `version` in `environment`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::VersionNotFound`] when nothing was saved for the
    /// version, or an I/O or decoding error for unreadable storage.
    async fn load(&self, version: &str, environment: Environment) -> CacheResult<DescriptorMap>;

    /// Replaces the descriptors saved for `version` in `environment`,
    /// retaining entries saved for other versions.
    ///
    /// # Errors
    ///
    /// Returns an I/O or encoding error when the store cannot be written.
    async fn save(
        &self,
        version: &str,
        environment: Environment,
        descriptors: &DescriptorMap,
    ) -> CacheResult<()>;
}
