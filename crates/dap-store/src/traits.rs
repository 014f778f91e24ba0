use async_trait::async_trait;

use crate::backend::BackendType;
use crate::error::StoreResult;

/// Base contract shared by every backend.
///
/// A backend implements exactly one of [`GeneratedKeyStore`] or
/// [`PrecomputedKeyStore`]; the manager picks which one to call from the
/// commitment mode, never by inspecting the backend at runtime.
#[async_trait]
pub trait Store: Send + Sync {
    /// Which kind of backend this is.
    fn backend_type(&self) -> BackendType;

    /// Check that `value` is trustworthy for `key`.
    ///
    /// An `Err` means the value must not be served; it is not a transport
    /// failure.
    async fn verify(&self, key: &[u8], value: &[u8]) -> StoreResult<()>;
}

/// Content-addressed store: the backend assigns the key on write.
#[async_trait]
pub trait GeneratedKeyStore: Store {
    /// Read the blob for `key`. Misses are `StoreError::NotFound`.
    async fn get(&self, key: &[u8]) -> StoreResult<Vec<u8>>;

    /// Write `value` and return the key the backend derived for it.
    async fn put(&self, value: &[u8]) -> StoreResult<Vec<u8>>;
}

/// Precomputed-key store: the caller supplies and owns the key namespace.
#[async_trait]
pub trait PrecomputedKeyStore: Store {
    /// Read the blob for `key`. Misses are `StoreError::NotFound`.
    async fn get(&self, key: &[u8]) -> StoreResult<Vec<u8>>;

    /// Write `value` under `key`, overwriting any previous value.
    async fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()>;
}
