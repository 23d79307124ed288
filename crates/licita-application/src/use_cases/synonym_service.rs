//! Synonym Service use case (spec C6 / §4.6).

use std::sync::Arc;

use licita_domain::constants::DEFAULT_SYNONYM_EXPANSION_MAX;
use licita_domain::error::Result;
use licita_domain::ports::{CacheProvider, SynonymProvider};

/// Expands a keyword into related Brazilian-Portuguese terms via an LLM,
/// cached per process (spec: synonym cache TTL is process-lifetime, so
/// `ttl_seconds = None` is passed through to the cache).
pub struct SynonymService {
    provider: Arc<dyn SynonymProvider>,
    cache: Arc<dyn CacheProvider>,
}

impl SynonymService {
    #[must_use]
    pub fn new(provider: Arc<dyn SynonymProvider>, cache: Arc<dyn CacheProvider>) -> Self {
        Self { provider, cache }
    }

    /// The original (lowercase-trimmed) term is always first in the
    /// result. Cache failures degrade to a live LLM call, never an
    /// error (spec §4.12: missing cache must never break functionality).
    pub async fn expand(&self, term: &str) -> Result<Vec<String>> {
        self.expand_with_max(term, DEFAULT_SYNONYM_EXPANSION_MAX).await
    }

    pub async fn expand_with_max(&self, term: &str, max: usize) -> Result<Vec<String>> {
        let key = cache_key(term);
        if let Ok(Some(bytes)) = self.cache.get(&key).await {
            if let Ok(cached) = serde_json::from_slice::<Vec<String>>(&bytes) {
                return Ok(cached);
            }
        }

        let normalized = term.trim().to_lowercase();
        let mut expanded = self.provider.expand(&normalized, max).await?;
        if expanded.first().map(String::as_str) != Some(normalized.as_str()) {
            expanded.retain(|s| s != &normalized);
            expanded.insert(0, normalized);
        }
        expanded.truncate(max);

        if let Ok(bytes) = serde_json::to_vec(&expanded) {
            let _ = self.cache.set(&key, bytes, None).await;
        }
        Ok(expanded)
    }

    /// Builds the OR-disjunction filter expression from an expansion
    /// (spec §4.4): `"t1" OR "t2" OR …`.
    #[must_use]
    pub fn to_or_expression(terms: &[String]) -> String {
        terms
            .iter()
            .map(|t| format!("\"{t}\""))
            .collect::<Vec<_>>()
            .join(" OR ")
    }
}

fn cache_key(term: &str) -> String {
    format!("synonym:{}", term.trim().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct StaticProvider;
    #[async_trait]
    impl SynonymProvider for StaticProvider {
        async fn expand(&self, term: &str, _max: usize) -> Result<Vec<String>> {
            Ok(vec![term.to_string(), "laptop".to_string(), "computador portátil".to_string()])
        }
    }

    struct InMemoryCache {
        store: Mutex<std::collections::HashMap<String, Vec<u8>>>,
    }
    impl InMemoryCache {
        fn new() -> Self {
            Self { store: Mutex::new(std::collections::HashMap::new()) }
        }
    }
    #[async_trait]
    impl CacheProvider for InMemoryCache {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
            Ok(self.store.lock().unwrap().get(key).cloned())
        }
        async fn set(&self, key: &str, value: Vec<u8>, _ttl_seconds: Option<u64>) -> Result<()> {
            self.store.lock().unwrap().insert(key.to_string(), value);
            Ok(())
        }
        async fn scan(&self, prefix: &str) -> Result<Vec<String>> {
            Ok(self.store.lock().unwrap().keys().filter(|k| k.starts_with(prefix)).cloned().collect())
        }
        async fn invalidate(&self, key: &str) -> Result<()> {
            self.store.lock().unwrap().remove(key);
            Ok(())
        }
    }

    #[tokio::test]
    async fn original_term_is_first() {
        let service = SynonymService::new(Arc::new(StaticProvider), Arc::new(InMemoryCache::new()));
        let result = service.expand("notebook").await.unwrap();
        assert_eq!(result[0], "notebook");
        assert!(result.contains(&"laptop".to_string()));
    }

    #[tokio::test]
    async fn expansion_is_idempotent_after_cache_warm_up() {
        let service = SynonymService::new(Arc::new(StaticProvider), Arc::new(InMemoryCache::new()));
        let first = service.expand("notebook").await.unwrap();
        let second = service.expand("notebook").await.unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn or_expression_quotes_each_term() {
        let terms = vec!["notebook".to_string(), "laptop".to_string()];
        assert_eq!(SynonymService::to_or_expression(&terms), "\"notebook\" OR \"laptop\"");
    }
}
