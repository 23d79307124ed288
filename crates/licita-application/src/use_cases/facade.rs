//! Inbound facade: the exact surface spec'd in §6 "External Interfaces",
//! wired against the use cases above. `licita-infrastructure`'s
//! composition root builds one [`CoreFacade`] at startup and hands it to
//! every transport (CLI, future HTTP) so no inbound adapter talks to a
//! use case directly.

use std::sync::Arc;

use chrono::NaiveDateTime;

use licita_domain::entities::{Opportunity, OpportunityItem};
use licita_domain::error::{Error, Result};
use licita_domain::ports::vector_store::VectorizationStatus;
use licita_domain::ports::{DocumentRepository, ProviderAdapter, VectorStoreProvider};
use licita_domain::value_objects::{OpportunityId, SearchFilters};

use crate::use_cases::matching_engine::{MatchRunSummary, MatchingEngine};
use crate::use_cases::retrieval_engine::{AnswerResult, RetrievalEngine};
use crate::use_cases::unified_search::{ProviderStatus, UnifiedSearchService};

/// `unified_search`/`search_by_provider` response envelope (spec §6).
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub opportunities: Vec<Opportunity>,
    pub total: usize,
    pub filters_applied: SearchFilters,
}

/// `run_matching` request parameters (spec §6). `vectorizer_kind` is
/// accepted for interface parity but unused: the embedding tier chain is
/// a startup-time composition-root decision, not a per-call one.
#[derive(Debug, Clone, Default)]
pub struct RunMatchingRequest {
    pub mode: MatchingMode,
    pub vectorizer_kind: Option<String>,
    pub clear_matches: bool,
    pub enable_llm: bool,
    pub date_from: Option<NaiveDateTime>,
    pub date_to: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchingMode {
    #[default]
    Incremental,
    Full,
}

pub struct CoreFacade {
    search: Arc<UnifiedSearchService>,
    matching: Arc<MatchingEngine>,
    retrieval: Arc<RetrievalEngine>,
    adapters: Vec<Arc<dyn ProviderAdapter>>,
    persistence: Arc<dyn licita_domain::ports::PersistenceService>,
    documents: Arc<dyn DocumentRepository>,
    vector_store: Arc<dyn VectorStoreProvider>,
}

impl CoreFacade {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        search: Arc<UnifiedSearchService>,
        matching: Arc<MatchingEngine>,
        retrieval: Arc<RetrievalEngine>,
        adapters: Vec<Arc<dyn ProviderAdapter>>,
        persistence: Arc<dyn licita_domain::ports::PersistenceService>,
        documents: Arc<dyn DocumentRepository>,
        vector_store: Arc<dyn VectorStoreProvider>,
    ) -> Self {
        Self {
            search,
            matching,
            retrieval,
            adapters,
            persistence,
            documents,
            vector_store,
        }
    }

    pub async fn unified_search(&self, filters: SearchFilters) -> Result<SearchResult> {
        let opportunities = self.search.search_combined(&filters).await?;
        Ok(SearchResult {
            total: opportunities.len(),
            opportunities,
            filters_applied: filters,
        })
    }

    pub async fn search_by_provider(&self, provider_name: &str, filters: SearchFilters) -> Result<SearchResult> {
        let opportunities = self.search.search_one(provider_name, &filters).await?;
        Ok(SearchResult {
            total: opportunities.len(),
            opportunities,
            filters_applied: filters,
        })
    }

    #[must_use]
    pub fn provider_stats(&self) -> Vec<ProviderStatus> {
        self.search.provider_stats()
    }

    pub async fn get_items(&self, provider_name: &str, external_id: &str) -> Result<Vec<OpportunityItem>> {
        self.find_adapter(provider_name)?.get_items(external_id).await
    }

    /// Bypasses whatever cache the adapter's own transport layer keeps,
    /// by re-fetching `get_details` first (spec §6: "force-refresh
    /// bypassing cache").
    pub async fn refresh_items(&self, provider_name: &str, external_id: &str) -> Result<Vec<OpportunityItem>> {
        let adapter = self.find_adapter(provider_name)?;
        let _ = adapter.get_details(external_id).await?;
        adapter.get_items(external_id).await
    }

    pub async fn run_matching(&self, request: RunMatchingRequest) -> Result<MatchRunSummary> {
        match request.mode {
            MatchingMode::Incremental => self.matching.run_incremental(request.enable_llm).await,
            MatchingMode::Full => {
                self.matching
                    .run_full(request.clear_matches, request.enable_llm, request.date_from, request.date_to)
                    .await
            }
        }
    }

    pub async fn rag_query(&self, opportunity_id: &OpportunityId, query: &str) -> Result<AnswerResult> {
        self.retrieval.answer(opportunity_id, query).await
    }

    pub async fn vectorization_status(&self, opportunity_id: &OpportunityId) -> Result<VectorizationStatus> {
        if self.persistence.get_by_id(opportunity_id).await?.is_none() {
            return Err(Error::not_found(format!("opportunity '{opportunity_id}'")));
        }
        let documents = self.documents.list_for_opportunity(opportunity_id).await?;
        let document_ids: Vec<_> = documents.into_iter().map(|d| d.id).collect();
        self.vector_store.vectorization_status(opportunity_id, &document_ids).await
    }

    fn find_adapter(&self, provider_name: &str) -> Result<&Arc<dyn ProviderAdapter>> {
        self.adapters
            .iter()
            .find(|a| a.provider_name() == provider_name)
            .ok_or_else(|| Error::not_found(format!("provider '{provider_name}'")))
    }
}
