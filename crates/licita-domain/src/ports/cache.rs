//! Cache Layer port (spec C12 / §4.12).
//!
//! Missing cache must never break functionality; it only degrades latency
//! (spec §7). Callers should treat any error from this port as a miss.

use async_trait::async_trait;

use crate::error::Result;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheProvider: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// `ttl_seconds = None` means "process-lifetime"/permanent, per the
    /// synonym- and embedding-cache policies in spec §4.12.
    async fn set(&self, key: &str, value: Vec<u8>, ttl_seconds: Option<u64>) -> Result<()>;

    /// Enumerates keys sharing `prefix`, for administrative purge.
    async fn scan(&self, prefix: &str) -> Result<Vec<String>>;

    async fn invalidate(&self, key: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Exercises the generated `MockCacheProvider` directly: a port-trait
    /// double configured with `mockall` behaves like any other
    /// `CacheProvider` implementor from the caller's perspective.
    #[tokio::test]
    async fn mock_cache_provider_satisfies_the_port() {
        let mut mock = MockCacheProvider::new();
        mock.expect_get().withf(|key| key == "synonym:notebook").returning(|_| Ok(Some(b"[\"notebook\"]".to_vec())));
        mock.expect_invalidate().returning(|_| Ok(()));

        let cache: Box<dyn CacheProvider> = Box::new(mock);
        let hit = cache.get("synonym:notebook").await.unwrap();
        assert_eq!(hit, Some(b"[\"notebook\"]".to_vec()));
        cache.invalidate("synonym:notebook").await.unwrap();
    }
}
