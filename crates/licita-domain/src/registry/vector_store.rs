//! Vector store registry (spec C10): selects the
//! [`crate::ports::vector_store::VectorStoreProvider`] backend (e.g.
//! `"pgvector"`, `"memory"`).

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct VectorStoreConfig {
    pub provider: String,
    pub dsn: Option<String>,
    pub extra: HashMap<String, String>,
}

crate::impl_registry!(
    provider_trait: crate::ports::vector_store::VectorStoreProvider,
    config_type: VectorStoreConfig,
    entry_type: VectorStoreRegistryEntry,
    slice_name: VECTOR_STORES,
    resolve_fn: resolve_vector_store,
    list_fn: list_vector_stores
);
