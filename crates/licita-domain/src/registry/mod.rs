//! Auto-registration registries built on [`crate::impl_registry`] and
//! [`crate::impl_chain_registry`]. Concrete providers in `licita-providers`
//! populate these `linkme` distributed slices by annotating a static
//! entry with `#[linkme::distributed_slice(...)]`; nothing in this crate
//! references a concrete provider type directly.

pub mod embedding;
pub mod extraction;
pub mod llm;
pub mod mapper;
pub mod vector_store;

pub use embedding::{
    resolve_embedding_tier, EmbeddingTierConfig, EmbeddingTierRegistryEntry, EMBEDDING_TIERS,
};
pub use extraction::{
    build_extraction_engines, ExtractionEngineConfig, ExtractionEngineRegistryEntry,
    EXTRACTION_ENGINES,
};
pub use llm::{resolve_llm_provider, LlmProviderConfig, LlmProviderRegistryEntry, LLM_PROVIDERS};
pub use mapper::{resolve_data_mapper, MapperConfig, MapperRegistryEntry, DATA_MAPPERS};
pub use vector_store::{
    resolve_vector_store, VectorStoreConfig, VectorStoreRegistryEntry, VECTOR_STORES,
};
