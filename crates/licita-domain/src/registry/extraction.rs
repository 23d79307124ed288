//! Text extraction engine chain registry (spec C8 / §4.8). Every
//! registered engine is built; the application-layer pipeline tries them
//! in descending `priority()` order.

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct ExtractionEngineConfig {
    pub extra: HashMap<String, String>,
}

crate::impl_chain_registry!(
    provider_trait: crate::ports::extraction::TextExtractionEngine,
    config_type: ExtractionEngineConfig,
    entry_type: ExtractionEngineRegistryEntry,
    slice_name: EXTRACTION_ENGINES,
    build_all_fn: build_extraction_engines
);
