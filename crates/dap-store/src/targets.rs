use std::sync::Arc;

use crate::backend::BackendType;
use crate::error::ConfigError;
use crate::traits::PrecomputedKeyStore;

/// Secondary backend handles constructed at startup. A `None` slot means
/// that backend type was not configured.
#[derive(Clone, Default)]
pub struct SecondaryBackends {
    pub object_store: Option<Arc<dyn PrecomputedKeyStore>>,
    pub kv_cache: Option<Arc<dyn PrecomputedKeyStore>>,
}

impl SecondaryBackends {
    fn handle(&self, backend: BackendType) -> Option<&Arc<dyn PrecomputedKeyStore>> {
        match backend {
            BackendType::ObjectStore => self.object_store.as_ref(),
            BackendType::KvCache => self.kv_cache.as_ref(),
            BackendType::DataAvailability | BackendType::Memory | BackendType::Unknown => None,
        }
    }
}

/// Map one configured target name to the backend type it selects.
///
/// Only types usable as a secondary target are accepted.
pub fn resolve_target(name: &str) -> Result<BackendType, ConfigError> {
    match name.parse().unwrap_or(BackendType::Unknown) {
        BackendType::Unknown => Err(ConfigError::UnknownTarget(name.to_string())),
        b if b.is_primary_only() => Err(ConfigError::PrimaryOnlyTarget(b)),
        b => Ok(b),
    }
}

/// Resolve configured target names into backend handles, preserving order.
///
/// The same handle may be returned for several names and may appear in both
/// the cache and the fallback list.
pub fn populate_targets(
    names: &[String],
    backends: &SecondaryBackends,
) -> Result<Vec<Arc<dyn PrecomputedKeyStore>>, ConfigError> {
    names
        .iter()
        .map(|name| {
            let backend = resolve_target(name)?;
            backends
                .handle(backend)
                .cloned()
                .ok_or(ConfigError::TargetNotConfigured(backend))
        })
        .collect()
}
