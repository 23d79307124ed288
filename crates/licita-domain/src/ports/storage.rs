//! Object storage port backing document downloads (spec C8 dependency).

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait ObjectStorageProvider: Send + Sync {
    /// Stores `bytes` under `key`, returning a provider-specific URL/path
    /// callers can later pass back to [`ObjectStorageProvider::get`].
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String>;

    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    async fn exists(&self, key: &str) -> Result<bool>;

    async fn delete(&self, key: &str) -> Result<()>;
}
