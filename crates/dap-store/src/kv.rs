//! In-process key-value cache backend.
//!
//! [`KvCacheStore`] is a bounded, TTL-evicting cache built on [`moka`]. It is
//! meant as a cache target: entries may vanish at any time, so it should not
//! be the only fallback for data that must survive.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;

use crate::backend::BackendType;
use crate::error::{StoreError, StoreResult};
use crate::traits::{PrecomputedKeyStore, Store};

/// Default maximum number of cached blobs.
pub const DEFAULT_CAPACITY: u64 = 10_000;

/// Default time-to-live for cached blobs.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Clone)]
pub struct KvCacheStore {
    cache: Cache<Vec<u8>, Arc<Vec<u8>>>,
}

impl KvCacheStore {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();
        Self { cache }
    }

    /// Approximate entry count; call [`Self::sync`] first for an exact figure.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Flush pending maintenance so counts and evictions are up to date.
    pub async fn sync(&self) {
        self.cache.run_pending_tasks().await;
    }
}

impl Default for KvCacheStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

impl std::fmt::Debug for KvCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvCacheStore")
            .field("entry_count", &self.cache.entry_count())
            .finish()
    }
}

#[async_trait]
impl Store for KvCacheStore {
    fn backend_type(&self) -> BackendType {
        BackendType::KvCache
    }

    async fn verify(&self, _key: &[u8], _value: &[u8]) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl PrecomputedKeyStore for KvCacheStore {
    async fn get(&self, key: &[u8]) -> StoreResult<Vec<u8>> {
        self.cache
            .get(key)
            .await
            .map(|value| value.as_ref().clone())
            .ok_or_else(|| StoreError::not_found(key))
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.cache
            .insert(key.to_vec(), Arc::new(value.to_vec()))
            .await;
        Ok(())
    }
}
