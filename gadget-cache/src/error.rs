//! Error types for the descriptor cache.

use thiserror::Error;

/// Result alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors emitted by metadata stores.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Underlying I/O failure while reading or writing the cache file.
    #[error("i/o error: {source}")]
    Io {
        /// Source [`std::io::Error`].
        #[from]
        source: std::io::Error,
    },

    /// The cache document could not be encoded or decoded.
    #[error("serialization error: {source}")]
    Serialization {
        /// Source [`serde_json::Error`].
        #[from]
        source: serde_json::Error,
    },

    /// Nothing is cached for the requested runtime version.
    #[error("no cached metadata for version `{version}`")]
    VersionNotFound {
        /// Runtime version that was looked up.
        version: String,
    },

    /// No cache directory was configured and none could be derived.
    #[error("cannot determine a cache directory: home directory is unknown")]
    NoCacheDir,
}
