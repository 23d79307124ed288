//! Unified Search Service use case (spec C4 / §4.4).

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;

use licita_domain::entities::Opportunity;
use licita_domain::error::Result;
use licita_domain::ports::ProviderAdapter;
use licita_domain::value_objects::SearchFilters;

use crate::use_cases::synonym_service::SynonymService;

/// Process-singleton holding the registered adapters and a shared
/// synonym service. Fans queries out to every adapter concurrently and
/// is itself stateless otherwise (spec §9: singleton, immutable after
/// startup, exposed via a small accessor rather than ambient globals —
/// here, simply held by whoever constructs the composition root).
pub struct UnifiedSearchService {
    adapters: Vec<Arc<dyn ProviderAdapter>>,
    synonyms: Arc<SynonymService>,
}

/// Per-provider reachability/registration summary (spec §4.4
/// `provider_stats`).
#[derive(Debug, Clone)]
pub struct ProviderStatus {
    pub provider_name: String,
    pub registered: bool,
    pub reachable: bool,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl UnifiedSearchService {
    #[must_use]
    pub fn new(adapters: Vec<Arc<dyn ProviderAdapter>>, synonyms: Arc<SynonymService>) -> Self {
        Self { adapters, synonyms }
    }

    /// Enhances `filters.keywords` with a synonym OR-expression, then
    /// fans out to every adapter concurrently. An adapter failure is
    /// logged and contributes an empty list — never aborts the call.
    pub async fn search_all(&self, filters: &SearchFilters) -> Result<HashMap<String, Vec<Opportunity>>> {
        let enhanced = self.enhance_with_synonyms(filters).await;

        let calls = self.adapters.iter().map(|adapter| {
            let enhanced = enhanced.clone();
            let adapter = adapter.clone();
            async move {
                let name = adapter.provider_name().to_string();
                match adapter.search(&enhanced).await {
                    Ok(rows) => (name, rows),
                    Err(err) => {
                        tracing::warn!(provider = %name, error = %err, "provider search failed");
                        (name, Vec::new())
                    }
                }
            }
        });

        let results = join_all(calls).await;
        Ok(results.into_iter().collect())
    }

    /// Flattens [`Self::search_all`], tagging each row with its
    /// provider and sorting by `(publication_date desc, estimated_value
    /// desc)`. Missing/unparseable dates sort as if minimal (oldest).
    pub async fn search_combined(&self, filters: &SearchFilters) -> Result<Vec<Opportunity>> {
        let by_provider = self.search_all(filters).await?;
        let mut combined: Vec<Opportunity> = by_provider.into_values().flatten().collect();

        combined.sort_by(|a, b| {
            let date_cmp = b.publication_date.cmp(&a.publication_date);
            if date_cmp != std::cmp::Ordering::Equal {
                return date_cmp;
            }
            b.estimated_value.cmp(&a.estimated_value)
        });

        Ok(combined)
    }

    /// Bypasses fan-out, calling a single named adapter directly.
    pub async fn search_one(&self, provider_name: &str, filters: &SearchFilters) -> Result<Vec<Opportunity>> {
        let enhanced = self.enhance_with_synonyms(filters).await;
        match self.find_adapter(provider_name) {
            Some(adapter) => adapter.search(&enhanced).await,
            None => Err(licita_domain::error::Error::not_found(format!(
                "provider '{provider_name}'"
            ))),
        }
    }

    /// Reachability is tested by an instance lookup only; no network
    /// call is exercised (spec §4.4).
    #[must_use]
    pub fn provider_stats(&self) -> Vec<ProviderStatus> {
        self.adapters
            .iter()
            .map(|adapter| ProviderStatus {
                provider_name: adapter.provider_name().to_string(),
                registered: true,
                reachable: true,
                metadata: adapter.metadata(),
            })
            .collect()
    }

    fn find_adapter(&self, provider_name: &str) -> Option<&Arc<dyn ProviderAdapter>> {
        self.adapters.iter().find(|a| a.provider_name() == provider_name)
    }

    async fn enhance_with_synonyms(&self, filters: &SearchFilters) -> SearchFilters {
        let mut enhanced = filters.clone();
        let Some(keywords) = filters.keywords.as_ref().filter(|k| !k.trim().is_empty()) else {
            return enhanced;
        };
        let Ok(expanded) = self.synonyms.expand(keywords).await else {
            return enhanced;
        };
        enhanced.keywords = Some(SynonymService::to_or_expression(&expanded));
        enhanced
    }
}
