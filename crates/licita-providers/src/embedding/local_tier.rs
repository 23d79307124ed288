//! Local CPU embedding tier (spec §4.5 "local last resort"), backed by
//! `fastembed`'s ONNX runtime so the fallback chain never fully fails
//! as long as the binary itself is up.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use licita_domain::error::{Error, Result};
use licita_domain::registry::{EmbeddingTierConfig, EmbeddingTierRegistryEntry, EMBEDDING_TIERS};
use licita_domain::value_objects::Embedding;

const MODEL_NAME: &str = "BAAI/bge-small-en-v1.5";
const DIMENSIONS: usize = 384;

pub struct LocalEmbeddingTier {
    // fastembed's `TextEmbedding::embed` takes `&mut self`; a std Mutex
    // serializes calls across the small number of concurrent callers
    // this tier ever sees (it only runs once the two paid tiers failed).
    model: Mutex<TextEmbedding>,
}

impl LocalEmbeddingTier {
    /// # Errors
    /// Returns [`Error::Configuration`] if the ONNX model cannot be
    /// loaded (e.g. no network on first run and no cached model files).
    pub fn new(cache_dir: Option<std::path::PathBuf>) -> Result<Self> {
        let mut options = InitOptions::new(EmbeddingModel::BGESmallENV15);
        if let Some(dir) = cache_dir {
            options = options.with_cache_dir(dir);
        }
        let model = TextEmbedding::try_new(options)
            .map_err(|e| Error::config(format!("failed to load local embedding model: {e}")))?;
        Ok(Self { model: Mutex::new(model) })
    }
}

#[async_trait]
impl licita_domain::ports::EmbeddingTier for LocalEmbeddingTier {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let owned: Vec<String> = texts.to_vec();
        let mut model = self.model.lock().map_err(|_| Error::embedding("local embedding model mutex poisoned"))?;
        let vectors = model
            .embed(owned, None)
            .map_err(|e| Error::embedding(format!("local embedding inference failed: {e}")))?;
        Ok(vectors.into_iter().map(|v| Embedding::new(v, MODEL_NAME.to_owned())).collect())
    }

    fn model_name(&self) -> &str {
        MODEL_NAME
    }

    fn dimensions(&self) -> usize {
        DIMENSIONS
    }

    fn max_batch_size(&self) -> usize {
        32
    }

    fn tier_name(&self) -> &str {
        "local"
    }
}

fn local_tier_factory(config: &EmbeddingTierConfig) -> std::result::Result<Arc<dyn licita_domain::ports::EmbeddingTier>, String> {
    LocalEmbeddingTier::new(config.cache_dir.clone())
        .map(|tier| Arc::new(tier) as Arc<dyn licita_domain::ports::EmbeddingTier>)
        .map_err(|e| e.to_string())
}

#[linkme::distributed_slice(EMBEDDING_TIERS)]
static FASTEMBED_LOCAL_TIER: EmbeddingTierRegistryEntry = EmbeddingTierRegistryEntry {
    name: "fastembed_local",
    description: "Local CPU embedding via fastembed, last resort in the fallback chain",
    build: local_tier_factory,
};
