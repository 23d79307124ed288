//! In-process cache provider (spec C12), backed by `moka`'s async cache.
//! Good enough for a single-instance deployment or local development;
//! anything sharing cache state across processes wants
//! [`super::RedisCacheProvider`] instead.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache;

use licita_domain::error::Result;
use licita_domain::ports::cache::CacheProvider;

#[derive(Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// `moka`'s builder-level `time_to_live` applies to the whole cache, not
/// per-entry, so callers that need a TTL narrower than "process lifetime"
/// (the RAG answer cache, the national-dataset snapshot cache) have their
/// expiry stamped onto the stored value and checked lazily on `get`/`scan`.
#[derive(Clone)]
pub struct MokaCacheProvider {
    cache: Cache<String, Entry>,
}

impl MokaCacheProvider {
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self { cache: Cache::builder().max_capacity(max_capacity).build() }
    }
}

#[async_trait]
impl CacheProvider for MokaCacheProvider {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.cache.get(key).await {
            Some(entry) if entry.is_expired() => {
                self.cache.invalidate(key).await;
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl_seconds: Option<u64>) -> Result<()> {
        let expires_at = ttl_seconds.map(|secs| Instant::now() + Duration::from_secs(secs));
        self.cache.insert(key.to_owned(), Entry { value, expires_at }).await;
        Ok(())
    }

    async fn scan(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .cache
            .iter()
            .filter(|(_, entry)| !entry.is_expired())
            .map(|(k, _)| (*k).clone())
            .filter(|k| k.starts_with(prefix))
            .collect())
    }

    async fn invalidate(&self, key: &str) -> Result<()> {
        self.cache.invalidate(key).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stores_and_retrieves_a_value() {
        let cache = MokaCacheProvider::new(100);
        cache.set("k", b"v".to_vec(), None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn scan_filters_by_prefix() {
        let cache = MokaCacheProvider::new(100);
        cache.set("national:2026-01:8", b"a".to_vec(), None).await.unwrap();
        cache.set("embedding:abc", b"b".to_vec(), None).await.unwrap();
        cache.cache.run_pending_tasks().await;
        let keys = cache.scan("national:").await.unwrap();
        assert_eq!(keys, vec!["national:2026-01:8".to_owned()]);
    }

    #[tokio::test]
    async fn invalidate_removes_the_entry() {
        let cache = MokaCacheProvider::new(100);
        cache.set("k", b"v".to_vec(), None).await.unwrap();
        cache.invalidate("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn entry_past_its_ttl_is_served_as_a_miss() {
        let cache = MokaCacheProvider::new(100);
        cache.set("k", b"v".to_vec(), Some(0)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
    }
}
