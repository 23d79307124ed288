//! Embedding tier port (spec C5 / §4.5).
//!
//! One implementation per tier (primary paid, secondary paid, local). The
//! fallback chain, batching, caching and deduplication are orchestrated by
//! the application-layer `EmbeddingService`, which depends only on this
//! port plus [`crate::ports::cache::CacheProvider`].

use async_trait::async_trait;

use crate::error::Result;
use crate::value_objects::Embedding;

#[async_trait]
pub trait EmbeddingTier: Send + Sync {
    /// Embeds a batch of texts, preserving order. Returns an error if the
    /// tier cannot serve the request at all (after its own internal retry
    /// policy is exhausted); a mismatched result count is also an error.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    fn model_name(&self) -> &str;

    fn dimensions(&self) -> usize;

    /// Default/maximum batch size this tier should be called with.
    fn max_batch_size(&self) -> usize {
        64
    }

    /// Tier identity used in logs and the fallback-chain ledger
    /// (`"primary"`, `"secondary"`, `"local"`).
    fn tier_name(&self) -> &str;
}
