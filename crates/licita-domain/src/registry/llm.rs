//! LLM-backed provider registry (spec C6, C11, C13): selects the
//! concrete [`crate::ports::llm::ChatCompletionProvider`] backend.
//! Synonym expansion, validation, rerank and answering are typically all
//! implemented by the same concrete provider over this shared config.

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct LlmProviderConfig {
    pub provider: String,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub extra: HashMap<String, String>,
}

crate::impl_registry!(
    provider_trait: crate::ports::llm::ChatCompletionProvider,
    config_type: LlmProviderConfig,
    entry_type: LlmProviderRegistryEntry,
    slice_name: LLM_PROVIDERS,
    resolve_fn: resolve_llm_provider,
    list_fn: list_llm_providers
);
