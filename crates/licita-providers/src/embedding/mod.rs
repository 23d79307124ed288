//! Embedding Tier providers (spec C5 / §4.5): a paid HTTP tier (used
//! for both "primary" and "secondary" with different configuration)
//! and a local CPU tier backed by `fastembed`, the last resort in the
//! fallback chain.

mod http_tier;
mod local_tier;

pub use http_tier::HttpEmbeddingTier;
pub use local_tier::LocalEmbeddingTier;
