//! File-backed metadata store writing one JSON document per environment.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use gadget_primitives::Environment;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{CacheError, CacheResult, DescriptorMap, MetadataStore};

/// Directory created under the user cache root.
pub const CACHE_DIR_NAME: &str = "ig-mcp-server";

type CacheDocument = BTreeMap<String, DescriptorMap>;

/// Stores descriptors in `cache-<environment>.json` inside a directory.
///
/// The document maps runtime versions to descriptor maps. Old versions are
/// kept; nothing here prunes them.
#[derive(Debug)]
pub struct FileMetadataStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileMetadataStore {
    /// Creates a store rooted at `dir`. The directory is created on first save.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Creates a store in `$HOME/.cache/ig-mcp-server`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::NoCacheDir`] when the home directory is unknown.
    pub fn in_default_dir() -> CacheResult<Self> {
        Self::default_dir().map(Self::new)
    }

    /// Returns `$HOME/.cache/ig-mcp-server`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::NoCacheDir`] when the home directory is unknown.
    pub fn default_dir() -> CacheResult<PathBuf> {
        let home = dirs::home_dir().ok_or(CacheError::NoCacheDir)?;
        Ok(home.join(".cache").join(CACHE_DIR_NAME))
    }

    /// Returns the directory holding the cache files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the cache file used for `environment`.
    #[must_use]
    pub fn path_for(&self, environment: Environment) -> PathBuf {
        self.dir.join(format!("cache-{}.json", environment.as_str()))
    }

    async fn read_document(path: &Path) -> CacheResult<Option<CacheDocument>> {
        match fs::read(path).await {
            Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl MetadataStore for FileMetadataStore {
    async fn load(&self, version: &str, environment: Environment) -> CacheResult<DescriptorMap> {
        let path = self.path_for(environment);
        let mut document = Self::read_document(&path)
            .await?
            .ok_or_else(|| CacheError::VersionNotFound {
                version: version.to_owned(),
            })?;

        document
            .remove(version)
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
        let _guard = self.write_lock.lock().await;
        fs::create_dir_all(&self.dir).await?;

        let path = self.path_for(environment);
        let mut document = match Self::read_document(&path).await {
            Ok(document) => document.unwrap_or_default(),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "replacing unreadable cache file");
                CacheDocument::new()
            }
        };
        document.insert(version.to_owned(), descriptors.clone());

        let data = serde_json::to_vec(&document)?;
        fs::write(&path, data).await?;
        debug!(
            path = %path.display(),
            version,
            entries = descriptors.len(),
            "saved gadget metadata cache"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gadget_primitives::{GadgetDescriptor, GadgetRef, ParamDescriptor};
    use uuid::Uuid;

    fn temp_dir() -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("gadget-cache-{}", Uuid::new_v4()));
        path
    }

    fn descriptors(images: &[&str]) -> DescriptorMap {
        images
            .iter()
            .map(|image| {
                let descriptor = GadgetDescriptor::builder(*image)
                    .param(ParamDescriptor::new("namespace").with_default("default"))
                    .metadata("name: trace dns\n")
                    .build()
                    .unwrap();
                (GadgetRef::new(*image).unwrap(), descriptor)
            })
            .collect()
    }

    #[tokio::test]
    async fn save_then_load_returns_the_same_map() {
        let dir = temp_dir();
        let store = FileMetadataStore::new(&dir);
        let saved = descriptors(&["registry/trace_dns:latest", "registry/trace_open:latest"]);

        store.save("v0.40.0", Environment::Kubernetes, &saved).await.unwrap();
        let loaded = store.load("v0.40.0", Environment::Kubernetes).await.unwrap();

        assert_eq!(loaded, saved);
        assert!(dir.join("cache-kubernetes.json").exists());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn other_versions_are_retained() {
        let dir = temp_dir();
        let store = FileMetadataStore::new(&dir);
        let old = descriptors(&["registry/trace_dns:latest"]);
        let new = descriptors(&["registry/trace_exec:latest"]);

        store.save("v1", Environment::Linux, &old).await.unwrap();
        store.save("v2", Environment::Linux, &new).await.unwrap();

        assert_eq!(store.load("v1", Environment::Linux).await.unwrap(), old);
        assert_eq!(store.load("v2", Environment::Linux).await.unwrap(), new);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn missing_file_and_version_are_not_found() {
        let dir = temp_dir();
        let store = FileMetadataStore::new(&dir);

        assert!(matches!(
            store.load("v1", Environment::Kubernetes).await,
            Err(CacheError::VersionNotFound { .. })
        ));

        store
            .save("v1", Environment::Kubernetes, &descriptors(&["registry/trace_dns:latest"]))
            .await
            .unwrap();
        assert!(matches!(
            store.load("v2", Environment::Kubernetes).await,
            Err(CacheError::VersionNotFound { version }) if version == "v2"
        ));
        assert!(matches!(
            store.load("v1", Environment::Linux).await,
            Err(CacheError::VersionNotFound { .. })
        ));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn unreadable_document_is_replaced_on_save() {
        let dir = temp_dir();
        let store = FileMetadataStore::new(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(store.path_for(Environment::Kubernetes), b"{not json").unwrap();

        assert!(matches!(
            store.load("v1", Environment::Kubernetes).await,
            Err(CacheError::Serialization { .. })
        ));

        let saved = descriptors(&["registry/trace_dns:latest"]);
        store.save("v1", Environment::Kubernetes, &saved).await.unwrap();
        assert_eq!(store.load("v1", Environment::Kubernetes).await.unwrap(), saved);
        let _ = std::fs::remove_dir_all(dir);
    }
}
