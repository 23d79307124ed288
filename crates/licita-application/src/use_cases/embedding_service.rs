//! Embedding Service use case (spec C5 / §4.5): batches text through a
//! cache-first, multi-tier fallback chain.

use std::sync::Arc;

use sha2::{Digest, Sha256};

use licita_domain::constants::DEFAULT_EMBEDDING_BATCH_SIZE;
use licita_domain::entities::EmbeddingCacheEntry;
use licita_domain::error::{Error, Result};
use licita_domain::ports::{CacheProvider, EmbeddingTier};
use licita_domain::value_objects::Embedding;

const CACHE_KEY_PREFIX: &str = "embedding:";

/// Orchestrates the primary → secondary → local embedding tier fallback
/// chain with a cache-first lookup and within-batch deduplication.
pub struct EmbeddingService {
    tiers: Vec<Arc<dyn EmbeddingTier>>,
    cache: Arc<dyn CacheProvider>,
}

impl EmbeddingService {
    /// `tiers` must already be ordered primary-first; the service tries
    /// each in turn and does not reorder them.
    #[must_use]
    pub fn new(tiers: Vec<Arc<dyn EmbeddingTier>>, cache: Arc<dyn CacheProvider>) -> Self {
        Self { tiers, cache }
    }

    /// Embeds every text in `texts`, preserving input order in the
    /// output. Returns an error only if every tier failed for the
    /// cache-miss subset (spec: "a batch lost by all tiers fails the
    /// whole call").
    pub async fn generate(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let hashes: Vec<String> = texts.iter().map(|t| hash_text(t)).collect();
        let mut resolved: Vec<Option<Embedding>> = vec![None; texts.len()];

        // Cache lookup, deduplicated by hash.
        let mut seen = std::collections::HashMap::new();
        for (i, hash) in hashes.iter().enumerate() {
            if let Some(&first_idx) = seen.get(hash) {
                // Filled in below once the first occurrence resolves.
                let _: usize = first_idx;
                continue;
            }
            seen.insert(hash.clone(), i);
            if let Ok(Some(bytes)) = self.cache.get(&cache_key(hash)).await {
                if let Ok(mut entry) = serde_json::from_slice::<EmbeddingCacheEntry>(&bytes) {
                    resolved[i] = Some(entry.embedding.clone());
                    self.touch_cache_entry(hash, &mut entry).await;
                }
            }
        }
        // Propagate resolved cache hits to duplicate-hash positions.
        for (i, hash) in hashes.iter().enumerate() {
            if resolved[i].is_none() {
                if let Some(&first_idx) = seen.get(hash) {
                    if first_idx != i {
                        resolved[i] = resolved[first_idx].clone();
                    }
                }
            }
        }

        let miss_indices: Vec<usize> = resolved
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_none())
            .map(|(i, _)| i)
            .collect();

        if miss_indices.is_empty() {
            return Ok(resolved.into_iter().map(|e| e.unwrap()).collect());
        }

        // Deduplicate misses by hash before sending to a tier.
        let mut unique_miss_hashes: Vec<String> = Vec::new();
        let mut hash_to_unique_idx = std::collections::HashMap::new();
        for &idx in &miss_indices {
            let hash = &hashes[idx];
            hash_to_unique_idx.entry(hash.clone()).or_insert_with(|| {
                unique_miss_hashes.push(hash.clone());
                unique_miss_hashes.len() - 1
            });
        }
        let unique_miss_texts: Vec<String> = unique_miss_hashes
            .iter()
            .map(|hash| {
                let idx = miss_indices
                    .iter()
                    .find(|&&i| &hashes[i] == hash)
                    .copied()
                    .expect("hash originates from miss_indices");
                texts[idx].clone()
            })
            .collect();

        let (unique_embeddings, model_name) = self.embed_via_fallback_chain(&unique_miss_texts).await?;

        for &idx in &miss_indices {
            let unique_idx = hash_to_unique_idx[&hashes[idx]];
            resolved[idx] = Some(unique_embeddings[unique_idx].clone());
        }

        self.store_cache_entries(&unique_miss_hashes, &unique_miss_texts, &unique_embeddings, &model_name)
            .await;

        Ok(resolved.into_iter().map(|e| e.unwrap()).collect())
    }

    /// Syntactic sugar over `generate(&[text])`.
    pub async fn generate_one(&self, text: &str) -> Result<Option<Embedding>> {
        let mut result = self.generate(std::slice::from_ref(&text.to_string())).await?;
        Ok(result.pop())
    }

    async fn embed_via_fallback_chain(&self, texts: &[String]) -> Result<(Vec<Embedding>, String)> {
        let mut last_err: Option<Error> = None;
        for tier in &self.tiers {
            match self.embed_batched_on_tier(tier.as_ref(), texts).await {
                Ok(embeddings) => return Ok((embeddings, tier.model_name().to_string())),
                Err(err) => {
                    tracing::warn!(tier = tier.tier_name(), error = %err, "embedding tier failed, falling through");
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| Error::embedding("no embedding tiers configured")))
    }

    async fn embed_batched_on_tier(
        &self,
        tier: &dyn EmbeddingTier,
        texts: &[String],
    ) -> Result<Vec<Embedding>> {
        let batch_size = tier.max_batch_size().min(DEFAULT_EMBEDDING_BATCH_SIZE).max(1);
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(batch_size) {
            let embeddings = tier.embed_batch(chunk).await?;
            if embeddings.len() != chunk.len() {
                return Err(Error::embedding(format!(
                    "tier '{}' returned {} embeddings for {} inputs",
                    tier.tier_name(),
                    embeddings.len(),
                    chunk.len()
                )));
            }
            out.extend(embeddings);
        }
        Ok(out)
    }

    /// Bumps `access_count`/`last_accessed_at` on a cache hit and writes
    /// the entry back unchanged otherwise (spec §3: "an embedding row is
    /// never rewritten: on conflict, update `last_accessed_at` and
    /// `access_count` only").
    async fn touch_cache_entry(&self, hash: &str, entry: &mut EmbeddingCacheEntry) {
        entry.access_count += 1;
        entry.last_accessed_at = chrono::Utc::now().naive_utc();
        if let Ok(bytes) = serde_json::to_vec(entry) {
            let _ = self.cache.set(&cache_key(hash), bytes, None).await;
        }
    }

    async fn store_cache_entries(
        &self,
        hashes: &[String],
        texts: &[String],
        embeddings: &[Embedding],
        model_name: &str,
    ) {
        let now = chrono::Utc::now().naive_utc();
        for ((hash, text), embedding) in hashes.iter().zip(texts).zip(embeddings) {
            let preview: String = text.chars().take(100).collect();
            let entry = EmbeddingCacheEntry {
                text_hash: hash.clone(),
                text_preview: preview,
                embedding: embedding.clone(),
                model_name: model_name.to_string(),
                created_at: now,
                last_accessed_at: now,
                access_count: 1,
            };
            if let Ok(bytes) = serde_json::to_vec(&entry) {
                // Embedding cache entries never expire (spec §4.12).
                let _ = self.cache.set(&cache_key(hash), bytes, None).await;
            }
        }
    }
}

fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

fn cache_key(hash: &str) -> String {
    format!("{CACHE_KEY_PREFIX}{hash}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

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

    struct FailingTier;
    #[async_trait]
    impl EmbeddingTier for FailingTier {
        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Embedding>> {
            Err(Error::upstream_permanent("primary", "500"))
        }
        fn model_name(&self) -> &str {
            "primary-model"
        }
        fn dimensions(&self) -> usize {
            8
        }
        fn tier_name(&self) -> &str {
            "primary"
        }
    }

    struct CountingTier {
        calls: AtomicUsize,
        dim: usize,
        name: &'static str,
    }
    #[async_trait]
    impl EmbeddingTier for CountingTier {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|_| Embedding { values: vec![0.5; self.dim], model_name: self.name.to_string() })
                .collect())
        }
        fn model_name(&self) -> &str {
            self.name
        }
        fn dimensions(&self) -> usize {
            self.dim
        }
        fn tier_name(&self) -> &str {
            "secondary"
        }
    }

    #[tokio::test]
    async fn falls_through_to_secondary_tier_on_primary_failure() {
        let secondary = Arc::new(CountingTier { calls: AtomicUsize::new(0), dim: 4, name: "secondary-model" });
        let service = EmbeddingService::new(
            vec![Arc::new(FailingTier), secondary.clone()],
            Arc::new(InMemoryCache::new()),
        );
        let result = service.generate(&["hello".to_string()]).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].model_name, "secondary-model");
        assert_eq!(secondary.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn deduplicates_identical_texts_within_one_batch() {
        let tier = Arc::new(CountingTier { calls: AtomicUsize::new(0), dim: 4, name: "m" });
        let service = EmbeddingService::new(vec![tier.clone()], Arc::new(InMemoryCache::new()));
        let texts = vec!["papel A4".to_string(), "papel A4".to_string(), "caneta".to_string()];
        let result = service.generate(&texts).await.unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(result[0].values, result[1].values);
    }

    #[tokio::test]
    async fn second_call_is_served_entirely_from_cache() {
        let tier = Arc::new(CountingTier { calls: AtomicUsize::new(0), dim: 4, name: "m" });
        let cache = Arc::new(InMemoryCache::new());
        let service = EmbeddingService::new(vec![tier.clone()], cache);
        let texts = vec!["aquisicao de material".to_string()];
        service.generate(&texts).await.unwrap();
        service.generate(&texts).await.unwrap();
        assert_eq!(tier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn mismatched_tier_count_is_treated_as_failure() {
        struct BadCountTier;
        #[async_trait]
        impl EmbeddingTier for BadCountTier {
            async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Embedding>> {
                Ok(vec![Embedding { values: vec![1.0], model_name: "bad".into() }])
            }
            fn model_name(&self) -> &str {
                "bad"
            }
            fn dimensions(&self) -> usize {
                1
            }
            fn tier_name(&self) -> &str {
                "bad"
            }
        }
        let service = EmbeddingService::new(vec![Arc::new(BadCountTier)], Arc::new(InMemoryCache::new()));
        let result = service.generate(&["a".to_string(), "b".to_string()]).await;
        assert!(result.is_err());
    }
}
