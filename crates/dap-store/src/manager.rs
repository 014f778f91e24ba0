//! The storage manager: mode-based dispatch to a primary backend, secondary
//! replication on writes, and ordered fallback with verification on reads.

use std::sync::Arc;

use async_trait::async_trait;
use dap_commitments::CommitmentMode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::backend::BackendType;
use crate::error::{StoreError, StoreResult};
use crate::metrics::StoreMetrics;
use crate::secondary::{push_cause, Enqueued, SecondaryRouter, TargetRole, WriteJob};
use crate::traits::{GeneratedKeyStore, PrecomputedKeyStore, Store};

/// Default maximum blob size (16 MiB).
pub const DEFAULT_MAX_BLOB_SIZE: usize = 16 * 1024 * 1024;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Largest blob `put` accepts.
    pub max_blob_size: usize,
    /// Consult cache targets before the primary on reads.
    pub read_caches_first: bool,
    /// Copy a fallback hit back into the cache targets.
    pub read_repair: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_blob_size: DEFAULT_MAX_BLOB_SIZE,
            read_caches_first: false,
            read_repair: true,
        }
    }
}

/// The primary backend serving one commitment mode.
///
/// The variant, not the backend's runtime type, decides which capability
/// the manager calls.
#[derive(Clone)]
pub enum PrimaryRoute {
    Generated(Arc<dyn GeneratedKeyStore>),
    Precomputed(Arc<dyn PrecomputedKeyStore>),
}

impl PrimaryRoute {
    async fn get(&self, key: &[u8]) -> StoreResult<Vec<u8>> {
        match self {
            Self::Generated(store) => store.get(key).await,
            Self::Precomputed(store) => store.get(key).await,
        }
    }
}

#[async_trait]
impl Store for PrimaryRoute {
    fn backend_type(&self) -> BackendType {
        match self {
            Self::Generated(store) => store.backend_type(),
            Self::Precomputed(store) => store.backend_type(),
        }
    }

    async fn verify(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        match self {
            Self::Generated(store) => store.verify(key, value).await,
            Self::Precomputed(store) => store.verify(key, value).await,
        }
    }
}

/// Orchestrates primary and secondary storage.
///
/// `Simple` and `BridgeGeneric` commitments are served by the content-addressed
/// DA backend; `BridgeKeccak` commitments by the precomputed-key backend.
/// Either may be absent, in which case requests for its modes fail with
/// [`StoreError::BackendUnavailable`].
pub struct Manager {
    da: Option<Arc<dyn GeneratedKeyStore>>,
    keccak: Option<Arc<dyn PrecomputedKeyStore>>,
    router: Arc<SecondaryRouter>,
    config: ManagerConfig,
}

impl Manager {
    pub fn new(
        da: Option<Arc<dyn GeneratedKeyStore>>,
        keccak: Option<Arc<dyn PrecomputedKeyStore>>,
        router: Arc<SecondaryRouter>,
        config: ManagerConfig,
    ) -> Self {
        Self {
            da,
            keccak,
            router,
            config,
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn router(&self) -> &Arc<SecondaryRouter> {
        &self.router
    }

    pub fn metrics(&self) -> &Arc<StoreMetrics> {
        self.router.metrics()
    }

    /// Resolve the primary backend for `mode`.
    pub fn route(&self, mode: CommitmentMode) -> StoreResult<PrimaryRoute> {
        match mode {
            CommitmentMode::Simple | CommitmentMode::BridgeGeneric => self
                .da
                .clone()
                .map(PrimaryRoute::Generated)
                .ok_or(StoreError::BackendUnavailable {
                    backend: BackendType::DataAvailability.as_str(),
                    mode,
                }),
            CommitmentMode::BridgeKeccak => self
                .keccak
                .clone()
                .map(PrimaryRoute::Precomputed)
                .ok_or(StoreError::BackendUnavailable {
                    backend: BackendType::ObjectStore.as_str(),
                    mode,
                }),
        }
    }

    /// Store `value` and return its commitment (undecorated by the codec).
    ///
    /// `caller_key` is required for precomputed-key modes and ignored
    /// otherwise. Secondary failures never fail the call.
    pub async fn put(
        &self,
        mode: CommitmentMode,
        caller_key: Option<&[u8]>,
        value: &[u8],
    ) -> StoreResult<Vec<u8>> {
        if value.len() > self.config.max_blob_size {
            return Err(StoreError::OversizedBlob {
                size: value.len(),
                max: self.config.max_blob_size,
            });
        }
        if mode.is_precomputed() && caller_key.is_none() {
            return Err(StoreError::MissingKey(mode));
        }

        let key = match self.route(mode)? {
            PrimaryRoute::Generated(store) => store.put(value).await?,
            PrimaryRoute::Precomputed(store) => {
                let key = caller_key.ok_or(StoreError::MissingKey(mode))?;
                store.verify(key, value).await?;
                store.put(key, value).await?;
                key.to_vec()
            }
        };
        debug!(%mode, key = %hex::encode(&key), size = value.len(), "stored blob in primary");

        if self.router.fallback_enabled() {
            self.router.write_fallbacks(&key, value).await;
        }
        self.replicate_to_caches(&key, value).await;
        Ok(key)
    }

    /// Fetch and verify the blob for `key`.
    ///
    /// A value that fails verification is never returned; it counts as a
    /// miss and the next source is tried.
    pub async fn get(&self, mode: CommitmentMode, key: &[u8]) -> StoreResult<Vec<u8>> {
        let route = self.route(mode)?;
        let metrics = self.router.metrics();
        let mut causes = Vec::new();

        if self.config.read_caches_first && self.router.caching_enabled() {
            match self.router.multi_source_read(key, TargetRole::Cache, &route).await {
                Ok(value) => {
                    metrics.record_cache_hit();
                    return Ok(value);
                }
                Err(e) => debug!(key = %hex::encode(key), error = %e, "cache read missed"),
            }
        }

        let primary_err = match route.get(key).await {
            Ok(value) => match route.verify(key, &value).await {
                Ok(()) => {
                    metrics.record_primary_hit();
                    return Ok(value);
                }
                Err(e) => {
                    metrics.record_verification_failure();
                    warn!(%mode, key = %hex::encode(key), error = %e, "primary value failed verification");
                    StoreError::NotFound {
                        key: hex::encode(key),
                        causes: vec![format!("{}: {e}", route.backend_type())],
                    }
                }
            },
            Err(e) => {
                metrics.record_primary_miss();
                e
            }
        };

        if !self.router.fallback_enabled() {
            return Err(primary_err);
        }
        match primary_err {
            StoreError::NotFound { causes: inner, .. } if !inner.is_empty() => {
                inner.into_iter().for_each(|c| push_cause(&mut causes, c));
            }
            e => push_cause(&mut causes, format!("{}: {e}", route.backend_type())),
        }

        match self.router.multi_source_read(key, TargetRole::Fallback, &route).await {
            Ok(value) => {
                metrics.record_fallback_hit();
                debug!(%mode, key = %hex::encode(key), "served from fallback");
                if self.config.read_repair {
                    self.replicate_to_caches(key, &value).await;
                }
                Ok(value)
            }
            Err(StoreError::NotFound { causes: inner, .. }) => {
                inner.into_iter().for_each(|c| push_cause(&mut causes, c));
                Err(StoreError::NotFound {
                    key: hex::encode(key),
                    causes,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Stop the replication workers. Queued jobs are discarded.
    pub async fn shutdown(&self) {
        self.router.shutdown().await;
    }

    async fn replicate_to_caches(&self, key: &[u8], value: &[u8]) {
        if !self.router.caching_enabled() {
            return;
        }
        let job = WriteJob::new(key.to_vec(), value.to_vec());
        if !self.router.is_async() {
            self.router.replicate(&job).await;
            return;
        }
        if self.router.enqueue(job) == Enqueued::ShutDown {
            debug!(key = %hex::encode(key), "replication skipped during shutdown");
        }
    }
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("da", &self.da.is_some())
            .field("keccak", &self.keccak.is_some())
            .field("router", &self.router)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use dap_commitments::keccak256;

    use super::*;
    use crate::secondary::SecondaryConfig;
    use crate::testutil::{MemoryDaStore, MemoryKeyStore};

    struct Harness {
        da: Arc<MemoryDaStore>,
        keccak: Arc<MemoryKeyStore>,
        caches: Vec<Arc<MemoryKeyStore>>,
        fallbacks: Vec<Arc<MemoryKeyStore>>,
        manager: Manager,
    }

    fn harness(caches: usize, fallbacks: usize, workers: usize, config: ManagerConfig) -> Harness {
        let da = Arc::new(MemoryDaStore::new());
        let keccak = Arc::new(MemoryKeyStore::new(BackendType::ObjectStore));
        let caches: Vec<_> = (0..caches)
            .map(|_| Arc::new(MemoryKeyStore::new(BackendType::KvCache)))
            .collect();
        let fallbacks: Vec<_> = (0..fallbacks)
            .map(|_| Arc::new(MemoryKeyStore::new(BackendType::ObjectStore)))
            .collect();

        let targets = |v: &[Arc<MemoryKeyStore>]| {
            v.iter()
                .map(|s| Arc::clone(s) as Arc<dyn PrecomputedKeyStore>)
                .collect::<Vec<_>>()
        };
        let router = Arc::new(SecondaryRouter::new(
            targets(&caches),
            targets(&fallbacks),
            SecondaryConfig {
                async_put_workers: workers,
                queue_capacity: 1024,
            },
            Arc::new(StoreMetrics::new()),
        ));
        if workers > 0 && router.enabled() {
            router.start();
        }
        let manager = Manager::new(
            Some(Arc::clone(&da) as Arc<dyn GeneratedKeyStore>),
            Some(Arc::clone(&keccak) as Arc<dyn PrecomputedKeyStore>),
            router,
            config,
        );
        Harness {
            da,
            keccak,
            caches,
            fallbacks,
            manager,
        }
    }

    fn simple(caches: usize, fallbacks: usize) -> Harness {
        harness(caches, fallbacks, 0, ManagerConfig::default())
    }

    // -----------------------------------------------------------------------
    // Round trips
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn round_trip_content_addressed_modes() {
        let h = simple(0, 0);
        for mode in [CommitmentMode::Simple, CommitmentMode::BridgeGeneric] {
            let key = h.manager.put(mode, None, b"payload").await.unwrap();
            assert_eq!(key, MemoryDaStore::key_for(b"payload"));
            assert_eq!(h.manager.get(mode, &key).await.unwrap(), b"payload");
        }
        assert_eq!(h.keccak.calls(), 0);
    }

    #[tokio::test]
    async fn round_trip_keccak_mode() {
        let h = simple(0, 0);
        let key = keccak256(b"payload");
        let out = h
            .manager
            .put(CommitmentMode::BridgeKeccak, Some(&key), b"payload")
            .await
            .unwrap();
        assert_eq!(out, key);
        assert_eq!(
            h.manager.get(CommitmentMode::BridgeKeccak, &key).await.unwrap(),
            b"payload"
        );
        assert_eq!(h.da.calls(), 0);
    }

    #[tokio::test]
    async fn keccak_mode_requires_caller_key() {
        let h = simple(0, 0);
        let err = h
            .manager
            .put(CommitmentMode::BridgeKeccak, None, b"payload")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingKey(CommitmentMode::BridgeKeccak)));
        assert_eq!(h.keccak.calls(), 0);
    }

    #[tokio::test]
    async fn keccak_mode_verifies_before_writing() {
        let h = simple(0, 0);
        h.keccak.reject_values(b"payload");
        let err = h
            .manager
            .put(CommitmentMode::BridgeKeccak, Some(b"key"), b"payload")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Verification(_)));
        assert_eq!(h.keccak.put_calls(), 0);
    }

    #[tokio::test]
    async fn missing_primary_is_unavailable() {
        let router = Arc::new(SecondaryRouter::disabled(Arc::new(StoreMetrics::new())));
        let manager = Manager::new(None, None, router, ManagerConfig::default());
        let err = manager.get(CommitmentMode::Simple, b"k").await.unwrap_err();
        assert!(matches!(err, StoreError::BackendUnavailable { .. }));
    }

    // -----------------------------------------------------------------------
    // Write path
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn oversized_blob_touches_no_backend() {
        let h = harness(
            1,
            1,
            0,
            ManagerConfig {
                max_blob_size: 8,
                ..Default::default()
            },
        );
        let err = h
            .manager
            .put(CommitmentMode::Simple, None, &[0u8; 9])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::OversizedBlob { size: 9, max: 8 }));
        assert_eq!(h.da.calls(), 0);
        assert_eq!(h.caches[0].calls(), 0);
        assert_eq!(h.fallbacks[0].calls(), 0);

        h.manager.put(CommitmentMode::Simple, None, &[0u8; 8]).await.unwrap();
    }

    #[tokio::test]
    async fn failed_primary_write_skips_replication() {
        let h = simple(1, 1);
        h.da.fail_puts(true);
        assert!(h.manager.put(CommitmentMode::Simple, None, b"v").await.is_err());
        assert_eq!(h.caches[0].put_calls(), 0);
        assert_eq!(h.fallbacks[0].put_calls(), 0);
    }

    #[tokio::test]
    async fn cache_failures_are_invisible_to_caller() {
        let h = simple(2, 0);
        h.caches[0].fail_puts(true);
        let key = h.manager.put(CommitmentMode::Simple, None, b"v").await.unwrap();
        assert_eq!(key, MemoryDaStore::key_for(b"v"));
        assert!(h.caches[1].contains(&key));
        assert_eq!(h.manager.metrics().snapshot().replication_failures, 1);
    }

    #[tokio::test]
    async fn fallback_targets_written_synchronously() {
        let h = harness(0, 2, 4, ManagerConfig::default());
        h.fallbacks[1].fail_puts(true);
        let key = h.manager.put(CommitmentMode::Simple, None, b"v").await.unwrap();
        assert!(h.fallbacks[0].contains(&key));
        assert_eq!(h.manager.metrics().snapshot().fallback_write_failures, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_puts_replicate_to_every_cache() {
        let h = harness(3, 0, 4, ManagerConfig::default());
        let manager = Arc::new(h.manager);
        let mut tasks = Vec::new();
        for i in 0..64u32 {
            let manager = Arc::clone(&manager);
            tasks.push(tokio::spawn(async move {
                manager
                    .put(CommitmentMode::Simple, None, format!("blob-{i}").as_bytes())
                    .await
                    .unwrap()
            }));
        }
        let mut keys = Vec::new();
        for task in tasks {
            keys.push(task.await.unwrap());
        }

        tokio::time::timeout(Duration::from_secs(5), manager.router().wait_idle())
            .await
            .unwrap();
        for cache in &h.caches {
            assert_eq!(cache.len(), 64);
            assert!(keys.iter().all(|k| cache.contains(k)));
        }
        assert_eq!(manager.metrics().snapshot().replication_dropped, 0);
        manager.shutdown().await;
    }

    // -----------------------------------------------------------------------
    // Read path
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn failing_primary_falls_back() {
        let h = simple(0, 1);
        h.fallbacks[0].insert(b"k", b"from-fallback");
        h.da.fail_gets(true);
        let value = h.manager.get(CommitmentMode::Simple, b"k").await.unwrap();
        assert_eq!(value, b"from-fallback");
        assert_eq!(h.manager.metrics().snapshot().fallback_hits, 1);
    }

    #[tokio::test]
    async fn fallbacks_consulted_in_order() {
        let h = simple(0, 2);
        h.fallbacks[1].insert(b"k", b"second");
        let value = h.manager.get(CommitmentMode::Simple, b"k").await.unwrap();
        assert_eq!(value, b"second");
        assert_eq!(h.fallbacks[0].get_calls(), 1);
        assert_eq!(h.fallbacks[1].get_calls(), 1);
    }

    #[tokio::test]
    async fn primary_hit_skips_fallbacks() {
        let h = simple(0, 1);
        let key = h.manager.put(CommitmentMode::Simple, None, b"v").await.unwrap();
        h.manager.get(CommitmentMode::Simple, &key).await.unwrap();
        assert_eq!(h.fallbacks[0].get_calls(), 0);
    }

    #[tokio::test]
    async fn unverified_primary_value_is_a_miss() {
        let h = simple(0, 1);
        h.da.insert(b"k", b"tampered");
        h.da.reject_values(b"tampered");
        h.fallbacks[0].insert(b"k", b"good");
        let value = h.manager.get(CommitmentMode::Simple, b"k").await.unwrap();
        assert_eq!(value, b"good");
        assert_eq!(h.manager.metrics().snapshot().verification_failures, 1);
    }

    #[tokio::test]
    async fn unverified_value_never_returned() {
        let h = simple(0, 1);
        h.da.reject_values(b"tampered");
        h.fallbacks[0].insert(b"k", b"tampered");
        let err = h.manager.get(CommitmentMode::Simple, b"k").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn exhausted_chain_aggregates_causes() {
        let h = simple(0, 2);
        h.fallbacks[0].fail_gets(true);
        let err = h.manager.get(CommitmentMode::Simple, b"k").await.unwrap_err();
        match err {
            StoreError::NotFound { key, causes } => {
                assert_eq!(key, hex::encode(b"k"));
                assert_eq!(causes.len(), 3, "{causes:?}");
                assert!(causes[0].starts_with("eigenda:"));
                assert!(causes[1].contains("injected get failure"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn primary_error_surfaces_without_fallbacks() {
        let h = simple(0, 0);
        h.da.fail_gets(true);
        let err = h.manager.get(CommitmentMode::Simple, b"k").await.unwrap_err();
        assert!(matches!(err, StoreError::Backend { .. }));
    }

    #[tokio::test]
    async fn fallback_hit_repairs_caches() {
        let h = simple(1, 1);
        h.fallbacks[0].insert(b"k", b"v");
        h.manager.get(CommitmentMode::Simple, b"k").await.unwrap();
        assert!(h.caches[0].contains(b"k"));
    }

    #[tokio::test]
    async fn read_repair_can_be_disabled() {
        let h = harness(
            1,
            1,
            0,
            ManagerConfig {
                read_repair: false,
                ..Default::default()
            },
        );
        h.fallbacks[0].insert(b"k", b"v");
        h.manager.get(CommitmentMode::Simple, b"k").await.unwrap();
        assert!(!h.caches[0].contains(b"k"));
    }

    #[tokio::test]
    async fn caches_read_first_when_configured() {
        let h = harness(
            1,
            0,
            0,
            ManagerConfig {
                read_caches_first: true,
                ..Default::default()
            },
        );
        h.caches[0].insert(b"k", b"cached");
        let value = h.manager.get(CommitmentMode::Simple, b"k").await.unwrap();
        assert_eq!(value, b"cached");
        assert_eq!(h.da.get_calls(), 0);
        assert_eq!(h.manager.metrics().snapshot().cache_hits, 1);
    }
}
