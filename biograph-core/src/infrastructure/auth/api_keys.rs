//! API-key repository
//!
//! Keys are returned to the caller once at generation time; only their
//! SHA-256 digest is persisted, so a storage dump never reveals usable keys.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::infrastructure::storage::{StorageBackend, StorageError};

/// API-key operation errors
#[derive(Debug, thiserror::Error)]
pub enum ApiKeyError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Storage-backed API-key repository.
pub struct ApiKeyRepository {
    backend: Arc<dyn StorageBackend>,
}

impl ApiKeyRepository {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    fn digest_key(digest: &str) -> String {
        format!("auth:api-key:{}", digest)
    }

    fn digest(key: &str) -> String {
        hex::encode(Sha256::digest(key.as_bytes()))
    }

    /// Generate a new key, persist its digest and return the plaintext.
    pub async fn generate(&self) -> Result<String, ApiKeyError> {
        let key = format!(
            "bg_{}{}",
            Uuid::new_v4().simple(),
            Uuid::new_v4().simple()
        );
        self.backend
            .set(&Self::digest_key(&Self::digest(&key)), "active")
            .await?;
        Ok(key)
    }

    /// Check whether `key` is a known, unrevoked key.
    pub async fn verify(&self, key: &str) -> Result<bool, ApiKeyError> {
        let value = self.backend.get(&Self::digest_key(&Self::digest(key))).await?;
        Ok(value.as_deref() == Some("active"))
    }

    /// Revoke a key. Returns whether the key existed.
    pub async fn revoke(&self, key: &str) -> Result<bool, ApiKeyError> {
        Ok(self
            .backend
            .delete(&Self::digest_key(&Self::digest(key)))
            .await?)
    }
}
