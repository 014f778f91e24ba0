//! Construction of the storage manager from a [`ProxyConfig`].

use std::sync::Arc;
use std::time::Duration;

use dap_store::{
    populate_targets, DigestVerifier, FsObjectStore, GeneratedKeyStore, KvCacheStore, Manager,
    MemStore, NoopVerifier, PrecomputedKeyStore, SecondaryBackends, SecondaryRouter,
    StoreMetrics, Verifier,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ProxyConfig;
use crate::error::{ServerError, ServerResult};

/// Shortest interval between memstore expiry sweeps.
const MIN_PRUNE_INTERVAL: Duration = Duration::from_secs(1);

/// Build every configured backend and wire them into a [`Manager`].
///
/// Configuration errors are returned before any backend is constructed.
/// Background tasks (replication workers, memstore pruning) stop when
/// `shutdown` is cancelled or [`Manager::shutdown`] is called.
pub async fn load_store_manager(
    config: &ProxyConfig,
    shutdown: CancellationToken,
) -> ServerResult<Arc<Manager>> {
    config.validate()?;

    let object_store: Option<Arc<dyn PrecomputedKeyStore>> = match &config.object_store.root {
        Some(root) => {
            info!(root = %root.display(), "using object store backend");
            let store = FsObjectStore::open(root).await.map_err(|e| {
                ServerError::Config(format!("object store {}: {e}", root.display()))
            })?;
            Some(Arc::new(store))
        }
        None => None,
    };

    let kv_cache: Option<Arc<dyn PrecomputedKeyStore>> = if config.kv_cache.enabled {
        info!(capacity = config.kv_cache.capacity, "using kv cache backend");
        Some(Arc::new(KvCacheStore::new(
            config.kv_cache.capacity,
            Duration::from_secs(config.kv_cache.ttl_secs),
        )))
    } else {
        None
    };

    let verifier: Arc<dyn Verifier> = if config.verify.enabled {
        info!("certificate verification enabled");
        Arc::new(DigestVerifier)
    } else {
        warn!("verification disabled");
        Arc::new(NoopVerifier)
    };

    let da: Option<Arc<dyn GeneratedKeyStore>> = if config.memstore.enabled {
        info!("using memstore backend for data availability");
        let memstore = Arc::new(MemStore::new(verifier, config.memstore_config()));
        if let Some(ttl) = memstore.config().expiration {
            let interval = (ttl / 2).max(MIN_PRUNE_INTERVAL);
            Arc::clone(&memstore).spawn_pruner(interval, shutdown.child_token());
        }
        Some(memstore)
    } else {
        None
    };

    let backends = SecondaryBackends {
        object_store: object_store.clone(),
        kv_cache,
    };
    let caches = populate_targets(&config.secondary.cache_targets, &backends)?;
    let fallbacks = populate_targets(&config.secondary.fallback_targets, &backends)?;

    let router = Arc::new(SecondaryRouter::new(
        caches,
        fallbacks,
        config.secondary_config(),
        Arc::new(StoreMetrics::new()),
    ));
    if router.enabled() && router.is_async() {
        router.start();
    } else if router.enabled() {
        debug!("secondary writes run inline");
    }

    info!(
        da = da.is_some(),
        object_store = object_store.is_some(),
        "created storage manager"
    );
    Ok(Arc::new(Manager::new(
        da,
        object_store,
        router,
        config.manager_config(),
    )))
}
