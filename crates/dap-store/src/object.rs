use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dap_commitments::keccak256;

use crate::backend::BackendType;
use crate::error::{StoreError, StoreResult};
use crate::traits::{PrecomputedKeyStore, Store};

/// Object store rooted at a local directory: one file per key, named by the
/// key's hex encoding.
///
/// Writes land in a temporary file first and are renamed into place, so a
/// reader never observes a partially written object.
#[derive(Debug)]
pub struct FsObjectStore {
    root: PathBuf,
    tmp_seq: AtomicU64,
}

impl FsObjectStore {
    /// Open (creating if needed) an object directory at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            tmp_seq: AtomicU64::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &[u8]) -> StoreResult<PathBuf> {
        if key.is_empty() {
            return Err(StoreError::backend(BackendType::ObjectStore, "empty object key"));
        }
        Ok(self.root.join(hex::encode(key)))
    }
}

#[async_trait]
impl Store for FsObjectStore {
    fn backend_type(&self) -> BackendType {
        BackendType::ObjectStore
    }

    /// Objects are keyed by `keccak256(value)`.
    async fn verify(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        let digest = keccak256(value);
        if key != digest.as_slice() {
            return Err(StoreError::Verification(format!(
                "key {} is not keccak256 of the value ({})",
                hex::encode(key),
                hex::encode(digest)
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl PrecomputedKeyStore for FsObjectStore {
    async fn get(&self, key: &[u8]) -> StoreResult<Vec<u8>> {
        let path = self.object_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::not_found(key)),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        let path = self.object_path(key)?;
        let seq = self.tmp_seq.fetch_add(1, Ordering::Relaxed);
        let tmp = self.root.join(format!(".tmp-{}-{seq}", hex::encode(key)));
        tokio::fs::write(&tmp, value).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_store() -> (tempfile::TempDir, FsObjectStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::open(dir.path().join("objects")).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn put_then_get() {
        let (_dir, store) = temp_store().await;
        let key = keccak256(b"object");
        store.put(&key, b"object").await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), b"object");
        assert!(store.root().join(hex::encode(key)).exists());
    }

    #[tokio::test]
    async fn overwrite_replaces_value() {
        let (_dir, store) = temp_store().await;
        store.put(b"k", b"one").await.unwrap();
        store.put(b"k", b"two").await.unwrap();
        assert_eq!(store.get(b"k").await.unwrap(), b"two");
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let (_dir, store) = temp_store().await;
        assert!(store.get(b"absent").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn empty_key_rejected() {
        let (_dir, store) = temp_store().await;
        let err = store.put(b"", b"v").await.unwrap_err();
        assert!(matches!(err, StoreError::Backend { backend: BackendType::ObjectStore, .. }));
    }

    #[tokio::test]
    async fn verify_checks_keccak() {
        let (_dir, store) = temp_store().await;
        store.verify(&keccak256(b"data"), b"data").await.unwrap();
        let err = store.verify(&keccak256(b"data"), b"other").await.unwrap_err();
        assert!(matches!(err, StoreError::Verification(_)));
    }

    #[tokio::test]
    async fn no_temp_files_left_behind() {
        let (_dir, store) = temp_store().await;
        store.put(b"k1", b"v1").await.unwrap();
        store.put(b"k2", b"v2").await.unwrap();
        let mut entries = tokio::fs::read_dir(store.root()).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            assert!(!entry.file_name().to_string_lossy().starts_with(".tmp-"));
        }
    }
}
