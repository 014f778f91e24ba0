use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};

/// Opaque integrity check applied before a value is handed back to a client.
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, key: &[u8], value: &[u8]) -> StoreResult<()>;
}

/// Verification disabled: every value passes.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopVerifier;

#[async_trait]
impl Verifier for NoopVerifier {
    async fn verify(&self, _key: &[u8], _value: &[u8]) -> StoreResult<()> {
        Ok(())
    }
}

/// Checks that a certificate is the domain-separated BLAKE3 digest of the
/// blob it names. This is the certificate scheme of [`crate::MemStore`].
#[derive(Clone, Copy, Debug, Default)]
pub struct DigestVerifier;

impl DigestVerifier {
    const DOMAIN: &'static [u8] = b"dap-cert-v0:";

    /// Derive the certificate for `value`.
    pub fn certificate(value: &[u8]) -> Vec<u8> {
        let mut hasher = blake3::Hasher::new();
        hasher.update(Self::DOMAIN);
        hasher.update(value);
        hasher.finalize().as_bytes().to_vec()
    }
}

#[async_trait]
impl Verifier for DigestVerifier {
    async fn verify(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        let expected = Self::certificate(value);
        if key != expected.as_slice() {
            return Err(StoreError::Verification(format!(
                "certificate {} does not match blob digest {}",
                hex::encode(key),
                hex::encode(&expected)
            )));
        }
        Ok(())
    }
}
