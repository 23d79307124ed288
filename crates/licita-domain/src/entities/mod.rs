//! Domain entities: objects with identity that persist across the
//! ingestion → matching → RAG pipeline.

mod cache_entry;
mod chunk;
mod company;
mod document;
#[allow(clippy::module_inception)]
mod match_;
mod opportunity;

pub use cache_entry::{CacheEntry, EmbeddingCacheEntry};
pub use chunk::Chunk;
pub use company::Company;
pub use document::Document;
pub use match_::Match;
pub use opportunity::{Opportunity, OpportunityItem};
