use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::backend::BackendType;
use crate::error::{StoreError, StoreResult};
use crate::traits::{GeneratedKeyStore, Store};
use crate::verify::{DigestVerifier, Verifier};

/// Configuration for [`MemStore`].
#[derive(Clone, Debug)]
pub struct MemStoreConfig {
    /// Largest blob accepted by `put`.
    pub max_blob_size: usize,
    /// Entries older than this read as not-found. `None` keeps them forever.
    pub expiration: Option<Duration>,
    /// Artificial latency added to each `put`, to mimic a DA network.
    pub put_latency: Duration,
    /// Artificial latency added to each `get`.
    pub get_latency: Duration,
}

impl Default for MemStoreConfig {
    fn default() -> Self {
        Self {
            max_blob_size: 16 * 1024 * 1024,
            expiration: None,
            put_latency: Duration::ZERO,
            get_latency: Duration::ZERO,
        }
    }
}

struct Entry {
    value: Vec<u8>,
    stored_at: Instant,
}

/// In-memory stand-in for the data-availability network.
///
/// Content-addressed: the certificate returned by `put` is the
/// [`DigestVerifier`] digest of the blob. Verification is delegated to the
/// configured [`Verifier`], so a disabled verifier makes every read pass.
pub struct MemStore {
    entries: RwLock<HashMap<Vec<u8>, Entry>>,
    verifier: Arc<dyn Verifier>,
    config: MemStoreConfig,
}

impl MemStore {
    pub fn new(verifier: Arc<dyn Verifier>, config: MemStoreConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            verifier,
            config,
        }
    }

    pub fn config(&self) -> &MemStoreConfig {
        &self.config
    }

    /// Number of stored blobs, including expired ones not yet pruned.
    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().expect("lock poisoned").is_empty()
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn prune_expired(&self) -> usize {
        let Some(ttl) = self.config.expiration else {
            return 0;
        };
        let mut map = self.entries.write().expect("lock poisoned");
        let before = map.len();
        map.retain(|_, entry| entry.stored_at.elapsed() < ttl);
        before - map.len()
    }

    /// Run [`Self::prune_expired`] every `interval` until `shutdown` fires.
    pub fn spawn_pruner(
        self: Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = self.prune_expired();
                        if removed > 0 {
                            debug!(removed, "pruned expired memstore blobs");
                        }
                    }
                }
            }
        })
    }

    fn is_expired(&self, entry: &Entry) -> bool {
        self.config
            .expiration
            .map(|ttl| entry.stored_at.elapsed() >= ttl)
            .unwrap_or(false)
    }
}

#[async_trait]
impl Store for MemStore {
    fn backend_type(&self) -> BackendType {
        BackendType::Memory
    }

    async fn verify(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.verifier.verify(key, value).await
    }
}

#[async_trait]
impl GeneratedKeyStore for MemStore {
    async fn get(&self, key: &[u8]) -> StoreResult<Vec<u8>> {
        if !self.config.get_latency.is_zero() {
            tokio::time::sleep(self.config.get_latency).await;
        }
        let map = self.entries.read().expect("lock poisoned");
        match map.get(key) {
            Some(entry) if !self.is_expired(entry) => Ok(entry.value.clone()),
            _ => Err(StoreError::not_found(key)),
        }
    }

    async fn put(&self, value: &[u8]) -> StoreResult<Vec<u8>> {
        if value.len() > self.config.max_blob_size {
            return Err(StoreError::OversizedBlob {
                size: value.len(),
                max: self.config.max_blob_size,
            });
        }
        if !self.config.put_latency.is_zero() {
            tokio::time::sleep(self.config.put_latency).await;
        }
        let cert = DigestVerifier::certificate(value);
        let mut map = self.entries.write().expect("lock poisoned");
        map.insert(
            cert.clone(),
            Entry {
                value: value.to_vec(),
                stored_at: Instant::now(),
            },
        );
        Ok(cert)
    }
}

impl std::fmt::Debug for MemStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemStore")
            .field("blob_count", &self.len())
            .field("config", &self.config)
            .finish()
    }
}
