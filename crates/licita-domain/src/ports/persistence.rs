//! Persistence Service port (spec C3 / §4.3).

use async_trait::async_trait;

use crate::entities::{Company, Match, Opportunity, OpportunityItem};
use crate::error::Result;
use crate::value_objects::{CompanyId, OpportunityId};

/// Counters returned by a batch upsert (spec §4.3, §8 invariant:
/// `success + failed + skipped == len(batch)`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSaveResult {
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// SQL-level filters accepted by [`PersistenceService::search`] (spec
/// §4.3: limited to `status`, `region_code`, `category`).
#[derive(Debug, Clone, Default)]
pub struct PersistenceFilters {
    pub status: Option<String>,
    pub region_code: Option<String>,
    pub category: Option<String>,
    pub date_from: Option<chrono::NaiveDateTime>,
    pub date_to: Option<chrono::NaiveDateTime>,
}

#[derive(Debug, Clone)]
pub struct ProviderStat {
    pub provider_name: String,
    pub count: i64,
}

#[derive(Debug, Clone)]
pub struct PersistenceStats {
    pub total: i64,
    pub by_provider: Vec<ProviderStat>,
}

#[async_trait]
pub trait PersistenceService: Send + Sync {
    /// Insert-if-absent, full-row update if present, keyed by
    /// `(provider_name, external_id)`. Never overwrites `created_at`.
    async fn save(&self, opportunity: &Opportunity) -> Result<bool>;

    /// Groups by provider to amortize mapper lookup. Any opportunity
    /// missing `provider_name` is counted as `skipped`, never fails the
    /// batch.
    async fn save_batch(&self, opportunities: &[Opportunity]) -> Result<BatchSaveResult>;

    async fn get(&self, provider_name: &str, external_id: &str) -> Result<Option<Opportunity>>;

    /// Looks up an opportunity by its persisted surrogate id, used by the
    /// RAG query path which only ever sees `OpportunityId` (spec §6
    /// `rag_query`).
    async fn get_by_id(&self, opportunity_id: &OpportunityId) -> Result<Option<Opportunity>>;

    async fn save_items(&self, opportunity_id: &OpportunityId, items: &[OpportunityItem]) -> Result<()>;

    async fn search(
        &self,
        provider_name: Option<&str>,
        filters: &PersistenceFilters,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Opportunity>>;

    async fn stats(&self) -> Result<PersistenceStats>;

    // ---- Companies ----

    async fn get_company(&self, id: &CompanyId) -> Result<Option<Company>>;

    async fn list_companies(&self) -> Result<Vec<Company>>;

    // ---- Matches ----

    /// Upsert a match row; at most one row exists per
    /// `(company_id, opportunity_id)` (spec invariant).
    async fn upsert_match(&self, m: &Match) -> Result<()>;

    async fn clear_matches_for_opportunities(&self, opportunity_ids: &[OpportunityId]) -> Result<u64>;

    async fn has_match(&self, company_id: &CompanyId, opportunity_id: &OpportunityId) -> Result<bool>;

    async fn recent_opportunities(&self, since_days: i64) -> Result<Vec<Opportunity>>;
}
