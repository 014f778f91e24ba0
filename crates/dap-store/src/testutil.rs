//! Call-counting, failure-injecting backends for tests.
//!
//! Both doubles keep their blobs in a `RwLock<HashMap>` and count every
//! backend call, so tests can assert that a rejected request never reached a
//! backend.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;

use crate::backend::BackendType;
use crate::error::{StoreError, StoreResult};
use crate::traits::{GeneratedKeyStore, PrecomputedKeyStore, Store};

#[derive(Default)]
struct Doubles {
    blobs: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
    rejected: RwLock<HashSet<Vec<u8>>>,
    fail_gets: AtomicBool,
    fail_puts: AtomicBool,
    put_delay_ms: AtomicU64,
    get_calls: AtomicUsize,
    put_calls: AtomicUsize,
    verify_calls: AtomicUsize,
}

impl Doubles {
    async fn get(&self, backend: BackendType, key: &[u8]) -> StoreResult<Vec<u8>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(StoreError::backend(backend, "injected get failure"));
        }
        self.blobs
            .read()
            .expect("lock poisoned")
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::not_found(key))
    }

    async fn put(&self, backend: BackendType, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.put_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StoreError::backend(backend, "injected put failure"));
        }
        self.insert(key, value);
        Ok(())
    }

    fn verify(&self, value: &[u8]) -> StoreResult<()> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        if self.rejected.read().expect("lock poisoned").contains(value) {
            return Err(StoreError::Verification("value rejected by test double".into()));
        }
        Ok(())
    }

    fn insert(&self, key: &[u8], value: &[u8]) {
        self.blobs
            .write()
            .expect("lock poisoned")
            .insert(key.to_vec(), value.to_vec());
    }

    fn contains(&self, key: &[u8]) -> bool {
        self.blobs.read().expect("lock poisoned").contains_key(key)
    }

    fn len(&self) -> usize {
        self.blobs.read().expect("lock poisoned").len()
    }
}

macro_rules! double_controls {
    () => {
        /// Seed a blob without counting a call.
        pub fn insert(&self, key: &[u8], value: &[u8]) {
            self.inner.insert(key, value);
        }

        pub fn contains(&self, key: &[u8]) -> bool {
            self.inner.contains(key)
        }

        pub fn len(&self) -> usize {
            self.inner.len()
        }

        pub fn is_empty(&self) -> bool {
            self.inner.len() == 0
        }

        pub fn fail_gets(&self, fail: bool) {
            self.inner.fail_gets.store(fail, Ordering::SeqCst);
        }

        pub fn fail_puts(&self, fail: bool) {
            self.inner.fail_puts.store(fail, Ordering::SeqCst);
        }

        pub fn set_put_delay(&self, delay: Duration) {
            self.inner
                .put_delay_ms
                .store(delay.as_millis() as u64, Ordering::SeqCst);
        }

        /// Make `verify` fail whenever it sees exactly `value`.
        pub fn reject_values(&self, value: &[u8]) {
            self.inner
                .rejected
                .write()
                .expect("lock poisoned")
                .insert(value.to_vec());
        }

        pub fn get_calls(&self) -> usize {
            self.inner.get_calls.load(Ordering::SeqCst)
        }

        pub fn put_calls(&self) -> usize {
            self.inner.put_calls.load(Ordering::SeqCst)
        }

        pub fn verify_calls(&self) -> usize {
            self.inner.verify_calls.load(Ordering::SeqCst)
        }

        /// Total backend calls of any kind.
        pub fn calls(&self) -> usize {
            self.get_calls() + self.put_calls() + self.verify_calls()
        }
    };
}

/// Precomputed-key double. Reports whatever [`BackendType`] it was built with.
pub struct MemoryKeyStore {
    backend: BackendType,
    inner: Doubles,
}

impl MemoryKeyStore {
    pub fn new(backend: BackendType) -> Self {
        Self {
            backend,
            inner: Doubles::default(),
        }
    }

    double_controls!();
}

impl std::fmt::Debug for MemoryKeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryKeyStore")
            .field("backend", &self.backend)
            .field("blob_count", &self.len())
            .finish()
    }
}

#[async_trait]
impl Store for MemoryKeyStore {
    fn backend_type(&self) -> BackendType {
        self.backend
    }

    async fn verify(&self, _key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.inner.verify(value)
    }
}

#[async_trait]
impl PrecomputedKeyStore for MemoryKeyStore {
    async fn get(&self, key: &[u8]) -> StoreResult<Vec<u8>> {
        self.inner.get(self.backend, key).await
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.inner.put(self.backend, key, value).await
    }
}

/// Content-addressed double standing in for the DA network. Keys are the
/// BLAKE3 digest of the value.
pub struct MemoryDaStore {
    inner: Doubles,
}

impl MemoryDaStore {
    pub fn new() -> Self {
        Self {
            inner: Doubles::default(),
        }
    }

    /// The key `put` assigns to `value`.
    pub fn key_for(value: &[u8]) -> Vec<u8> {
        blake3::hash(value).as_bytes().to_vec()
    }

    double_controls!();
}

impl Default for MemoryDaStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryDaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDaStore")
            .field("blob_count", &self.len())
            .finish()
    }
}

#[async_trait]
impl Store for MemoryDaStore {
    fn backend_type(&self) -> BackendType {
        BackendType::DataAvailability
    }

    async fn verify(&self, _key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.inner.verify(value)
    }
}

#[async_trait]
impl GeneratedKeyStore for MemoryDaStore {
    async fn get(&self, key: &[u8]) -> StoreResult<Vec<u8>> {
        self.inner.get(BackendType::DataAvailability, key).await
    }

    async fn put(&self, value: &[u8]) -> StoreResult<Vec<u8>> {
        let key = Self::key_for(value);
        self.inner
            .put(BackendType::DataAvailability, &key, value)
            .await?;
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counts_calls_and_injects_failures() {
        let store = MemoryKeyStore::new(BackendType::ObjectStore);
        store.put(b"k", b"v").await.unwrap();
        assert_eq!(store.get(b"k").await.unwrap(), b"v");

        store.fail_gets(true);
        assert!(!store.get(b"k").await.unwrap_err().is_not_found());
        assert_eq!(store.get_calls(), 2);
        assert_eq!(store.put_calls(), 1);
    }

    #[tokio::test]
    async fn da_double_is_content_addressed() {
        let da = MemoryDaStore::new();
        let key = da.put(b"blob").await.unwrap();
        assert_eq!(key, MemoryDaStore::key_for(b"blob"));
        assert_eq!(da.get(&key).await.unwrap(), b"blob");
    }

    #[tokio::test]
    async fn rejected_values_fail_verification() {
        let da = MemoryDaStore::new();
        da.reject_values(b"bad");
        assert!(da.verify(b"k", b"good").await.is_ok());
        assert!(matches!(
            da.verify(b"k", b"bad").await.unwrap_err(),
            StoreError::Verification(_)
        ));
        assert_eq!(da.verify_calls(), 2);
    }
}
