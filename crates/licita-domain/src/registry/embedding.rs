//! Embedding tier registry (spec C5): one
//! [`crate::ports::embedding::EmbeddingTier`] per fallback tier
//! (`"primary"`, `"secondary"`, `"local"`), selected by tier name.

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct EmbeddingTierConfig {
    pub provider: String,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub dimensions: Option<usize>,
    pub cache_dir: Option<std::path::PathBuf>,
    pub extra: HashMap<String, String>,
}

crate::impl_registry!(
    provider_trait: crate::ports::embedding::EmbeddingTier,
    config_type: EmbeddingTierConfig,
    entry_type: EmbeddingTierRegistryEntry,
    slice_name: EMBEDDING_TIERS,
    resolve_fn: resolve_embedding_tier,
    list_fn: list_embedding_tiers
);
