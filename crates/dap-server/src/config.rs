use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use dap_store::manager::DEFAULT_MAX_BLOB_SIZE;
use dap_store::{
    resolve_target, BackendType, ConfigError, ManagerConfig, MemStoreConfig, SecondaryConfig,
};
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// Proxy configuration, loaded from TOML.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub bind_addr: SocketAddr,
    pub max_blob_size: usize,
    pub request_timeout_secs: u64,
    pub memstore: MemstoreSection,
    pub object_store: ObjectStoreSection,
    pub kv_cache: KvCacheSection,
    pub verify: VerifySection,
    pub secondary: SecondarySection,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3100),
            max_blob_size: DEFAULT_MAX_BLOB_SIZE,
            request_timeout_secs: 60,
            memstore: MemstoreSection::default(),
            object_store: ObjectStoreSection::default(),
            kv_cache: KvCacheSection::default(),
            verify: VerifySection::default(),
            secondary: SecondarySection::default(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MemstoreSection {
    pub enabled: bool,
    /// Seconds until a stored blob reads as missing. Unset keeps blobs forever.
    pub expiration_secs: Option<u64>,
    pub put_latency_ms: u64,
    pub get_latency_ms: u64,
}

impl Default for MemstoreSection {
    fn default() -> Self {
        Self {
            enabled: true,
            expiration_secs: None,
            put_latency_ms: 0,
            get_latency_ms: 0,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectStoreSection {
    /// Object directory. The object store is disabled when unset.
    pub root: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct KvCacheSection {
    pub enabled: bool,
    pub capacity: u64,
    pub ttl_secs: u64,
}

impl Default for KvCacheSection {
    fn default() -> Self {
        Self {
            enabled: false,
            capacity: dap_store::kv::DEFAULT_CAPACITY,
            ttl_secs: dap_store::kv::DEFAULT_TTL.as_secs(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifySection {
    pub enabled: bool,
}

impl Default for VerifySection {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SecondarySection {
    pub cache_targets: Vec<String>,
    pub fallback_targets: Vec<String>,
    pub async_put_workers: usize,
    pub queue_capacity: usize,
    pub read_caches_first: bool,
    pub read_repair: bool,
}

impl Default for SecondarySection {
    fn default() -> Self {
        let router = SecondaryConfig::default();
        let manager = ManagerConfig::default();
        Self {
            cache_targets: Vec::new(),
            fallback_targets: Vec::new(),
            async_put_workers: router.async_put_workers,
            queue_capacity: router.queue_capacity,
            read_caches_first: manager.read_caches_first,
            read_repair: manager.read_repair,
        }
    }
}

impl ProxyConfig {
    pub fn from_toml_str(s: &str) -> ServerResult<Self> {
        toml::from_str(s).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Read and parse a TOML file. Does not validate.
    pub fn load(path: impl AsRef<Path>) -> ServerResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Check the configuration without constructing any backend.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_blob_size == 0 {
            return Err(ConfigError::Invalid("max_blob_size must be positive".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("request_timeout_secs must be positive".into()));
        }
        if !self.memstore.enabled && self.object_store.root.is_none() {
            return Err(ConfigError::Invalid(
                "no primary backend: enable memstore or set object_store.root".into(),
            ));
        }
        if self.kv_cache.enabled && self.kv_cache.capacity == 0 {
            return Err(ConfigError::Invalid("kv_cache.capacity must be positive".into()));
        }
        if self.secondary.async_put_workers > 0 && self.secondary.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "secondary.queue_capacity must be positive when workers are enabled".into(),
            ));
        }
        let names = self
            .secondary
            .cache_targets
            .iter()
            .chain(&self.secondary.fallback_targets);
        for name in names {
            let backend = resolve_target(name)?;
            let configured = match backend {
                BackendType::ObjectStore => self.object_store.root.is_some(),
                BackendType::KvCache => self.kv_cache.enabled,
                _ => true,
            };
            if !configured {
                return Err(ConfigError::TargetNotConfigured(backend));
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            max_blob_size: self.max_blob_size,
            read_caches_first: self.secondary.read_caches_first,
            read_repair: self.secondary.read_repair,
        }
    }

    pub fn secondary_config(&self) -> SecondaryConfig {
        SecondaryConfig {
            async_put_workers: self.secondary.async_put_workers,
            queue_capacity: self.secondary.queue_capacity,
        }
    }

    pub fn memstore_config(&self) -> MemStoreConfig {
        MemStoreConfig {
            max_blob_size: self.max_blob_size,
            expiration: self.memstore.expiration_secs.map(Duration::from_secs),
            put_latency: Duration::from_millis(self.memstore.put_latency_ms),
            get_latency: Duration::from_millis(self.memstore.get_latency_ms),
        }
    }
}
