//! Bounded-concurrency descriptor fetching with retry and cache fallback.

use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use gadget_cache::DescriptorMap;
use gadget_manager::{GadgetError, GadgetManager};
use gadget_primitives::{GadgetDescriptor, GadgetRef};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, warn};

const DEFAULT_MAX_CONCURRENCY: NonZeroUsize = NonZeroUsize::new(10).unwrap();
const DEFAULT_MAX_ATTEMPTS: NonZeroUsize = NonZeroUsize::new(3).unwrap();
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Limits applied to one fetch round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchConfig {
    max_concurrency: NonZeroUsize,
    max_attempts: NonZeroUsize,
    retry_delay: Duration,
}

impl FetchConfig {
    /// Creates a configuration with the supplied limits.
    #[must_use]
    pub const fn new(
        max_concurrency: NonZeroUsize,
        max_attempts: NonZeroUsize,
        retry_delay: Duration,
    ) -> Self {
        Self {
            max_concurrency,
            max_attempts,
            retry_delay,
        }
    }

    /// Returns the in-flight fetch limit.
    #[must_use]
    pub const fn max_concurrency(self) -> NonZeroUsize {
        self.max_concurrency
    }

    /// Returns how many times one image is tried.
    #[must_use]
    pub const fn max_attempts(self) -> NonZeroUsize {
        self.max_attempts
    }

    /// Returns the pause between attempts.
    #[must_use]
    pub const fn retry_delay(self) -> Duration {
        self.retry_delay
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENCY, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY)
    }
}

type FetchOutcome = (GadgetRef, Result<GadgetDescriptor, GadgetError>);

/// Fetches descriptors for a batch of images.
pub struct InfoFetcher {
    manager: Arc<dyn GadgetManager>,
    config: FetchConfig,
}

impl std::fmt::Debug for InfoFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfoFetcher")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl InfoFetcher {
    /// Creates a fetcher calling `manager`.
    #[must_use]
    pub fn new(manager: Arc<dyn GadgetManager>, config: FetchConfig) -> Self {
        Self { manager, config }
    }

    /// Returns the configured limits.
    #[must_use]
    pub fn config(&self) -> FetchConfig {
        self.config
    }

    /// Resolves a descriptor for every image, preferring `cached` entries.
    ///
    /// Images that still fail after the configured attempts are logged and
    /// left out of the result; the round itself never fails.
    pub async fn fetch_all<'a, I>(&self, images: I, cached: &DescriptorMap) -> DescriptorMap
    where
        I: IntoIterator<Item = &'a GadgetRef>,
    {
        let images: BTreeSet<&GadgetRef> = images.into_iter().collect();
        let mut results = DescriptorMap::new();
        let mut missing = Vec::new();
        for image in images {
            match cached.get(image) {
                Some(descriptor) => {
                    debug!(image = %image, "using cached gadget info");
                    results.insert(image.clone(), descriptor.clone());
                }
                None => missing.push(image.clone()),
            }
        }
        if missing.is_empty() {
            return results;
        }

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.get()));
        let (tx, mut rx) = mpsc::channel::<FetchOutcome>(missing.len());
        let mut tasks = JoinSet::new();

        for image in missing {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            let manager = Arc::clone(&self.manager);
            let tx = tx.clone();
            let config = self.config;
            tasks.spawn(async move {
                let outcome = fetch_with_retries(manager.as_ref(), &image, config).await;
                drop(permit);
                // Capacity equals the batch size, so this never waits.
                let _ = tx.send((image, outcome)).await;
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                warn!(error = %err, "gadget info task failed");
            }
        }
        drop(tx);

        while let Some((image, outcome)) = rx.recv().await {
            match outcome {
                Ok(descriptor) => {
                    results.insert(image, descriptor);
                }
                Err(err) => {
                    warn!(image = %image, error = %err, "skipping gadget image due to error");
                }
            }
        }
        results
    }
}

async fn fetch_with_retries(
    manager: &dyn GadgetManager,
    image: &GadgetRef,
    config: FetchConfig,
) -> Result<GadgetDescriptor, GadgetError> {
    let attempts = config.max_attempts.get();
    let mut attempt = 1;
    loop {
        match manager.get_info(image).await {
            Ok(descriptor) => return Ok(descriptor),
            Err(err) if attempt < attempts => {
                warn!(image = %image, attempt, error = %err, "failed to get gadget info, retrying");
                tokio::time::sleep(config.retry_delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
