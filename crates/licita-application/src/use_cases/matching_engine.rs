//! Matching Engine use case (spec C7 / §4.7).
//!
//! For each `(company, opportunity)` candidate: vectorize both sides,
//! threshold the cosine similarity, optionally gate through an LLM
//! validator, then upsert a match row. Embeddings are cached per
//! normalized text by [`crate::use_cases::embedding_service::EmbeddingService`],
//! so repeated company texts across many opportunities amortize to
//! O(distinct texts) (spec §4.7 "Batching").

use std::sync::Arc;

use chrono::NaiveDateTime;

use licita_domain::constants::DEFAULT_VECTOR_SIMILARITY_THRESHOLD;
use licita_domain::entities::{Company, Match, Opportunity};
use licita_domain::error::Result;
use licita_domain::ports::{LlmValidatorProvider, PersistenceService};
use licita_domain::value_objects::cosine_similarity;

use crate::use_cases::embedding_service::EmbeddingService;

/// Counters returned by a matching run, surfaced to the caller instead of
/// raising on individual rejections (spec §7: "individual rejections are
/// logged, not raised").
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchRunSummary {
    pub pairs_evaluated: usize,
    pub matched: usize,
    pub rejected_below_threshold: usize,
    pub rejected_by_llm: usize,
}

/// Default lookback window for [`MatchingEngine::run_incremental`].
pub const DEFAULT_INCREMENTAL_LOOKBACK_DAYS: i64 = 7;

pub struct MatchingEngine {
    persistence: Arc<dyn PersistenceService>,
    embeddings: Arc<EmbeddingService>,
    validator: Option<Arc<dyn LlmValidatorProvider>>,
    vector_threshold: f32,
}

impl MatchingEngine {
    #[must_use]
    pub fn new(
        persistence: Arc<dyn PersistenceService>,
        embeddings: Arc<EmbeddingService>,
        validator: Option<Arc<dyn LlmValidatorProvider>>,
    ) -> Self {
        Self {
            persistence,
            embeddings,
            validator,
            vector_threshold: DEFAULT_VECTOR_SIMILARITY_THRESHOLD,
        }
    }

    #[must_use]
    pub fn with_vector_threshold(mut self, threshold: f32) -> Self {
        self.vector_threshold = threshold;
        self
    }

    /// Scans opportunities ingested in the last `since_days` that have no
    /// match row yet for each company, and evaluates them.
    pub async fn run_incremental(&self, enable_llm: bool) -> Result<MatchRunSummary> {
        let opportunities = self.persistence.recent_opportunities(DEFAULT_INCREMENTAL_LOOKBACK_DAYS).await?;
        let companies = self.persistence.list_companies().await?;
        self.evaluate(&companies, &opportunities, enable_llm, true).await
    }

    /// Recomputes matches for opportunities in `[date_from, date_to]`
    /// (or all opportunities, if both are `None`), optionally clearing
    /// prior match rows first (spec: idempotent only when
    /// `clear_matches=true`, otherwise rows accumulate).
    pub async fn run_full(
        &self,
        clear_matches: bool,
        enable_llm: bool,
        date_from: Option<NaiveDateTime>,
        date_to: Option<NaiveDateTime>,
    ) -> Result<MatchRunSummary> {
        use licita_domain::ports::persistence::PersistenceFilters;

        let filters = PersistenceFilters {
            date_from,
            date_to,
            ..Default::default()
        };
        let opportunities = self.persistence.search(None, &filters, usize::MAX, 0).await?;
        let companies = self.persistence.list_companies().await?;

        if clear_matches {
            let ids: Vec<_> = opportunities.iter().map(|o| opportunity_id(o)).collect();
            self.persistence.clear_matches_for_opportunities(&ids).await?;
        }

        self.evaluate(&companies, &opportunities, enable_llm, !clear_matches).await
    }

    /// Evaluates every `(company, opportunity)` pair. When
    /// `skip_existing` is `true`, a pair already carrying a match row is
    /// skipped entirely (used by the incremental path and by a
    /// non-clearing full run, both of which must not duplicate rows).
    async fn evaluate(
        &self,
        companies: &[Company],
        opportunities: &[Opportunity],
        enable_llm: bool,
        skip_existing: bool,
    ) -> Result<MatchRunSummary> {
        let mut summary = MatchRunSummary::default();

        for opportunity in opportunities {
            let opportunity_text = opportunity.vectorizable_text();
            let opportunity_id = opportunity_id(opportunity);

            for company in companies {
                if skip_existing
                    && self
                        .persistence
                        .has_match(&company.id, &opportunity_id)
                        .await
                        .unwrap_or(false)
                {
                    continue;
                }

                summary.pairs_evaluated += 1;
                let company_text = company.vectorizable_text();

                let embeddings = self
                    .embeddings
                    .generate(&[company_text, opportunity_text.clone()])
                    .await?;
                let similarity = cosine_similarity(&embeddings[0].values, &embeddings[1].values);

                if similarity < self.vector_threshold {
                    summary.rejected_below_threshold += 1;
                    continue;
                }

                let (llm_approved, llm_reasoning) = if enable_llm {
                    match &self.validator {
                        Some(validator) => {
                            // A validator failure is logged as a rejection for this
                            // pair, not raised; it must not abort the whole run.
                            let verdict = match validator.validate(company, opportunity, similarity).await {
                                Ok(verdict) => verdict,
                                Err(err) => {
                                    tracing::warn!(
                                        company_id = %company.id,
                                        opportunity_id = %opportunity_id,
                                        error = %err,
                                        "llm validator failed, rejecting pair"
                                    );
                                    summary.rejected_by_llm += 1;
                                    continue;
                                }
                            };
                            if !verdict.approved {
                                summary.rejected_by_llm += 1;
                                continue;
                            }
                            (Some(true), Some(verdict.reasoning))
                        }
                        None => (None, None),
                    }
                } else {
                    (None, None)
                };

                let m = Match {
                    company_id: company.id.clone(),
                    opportunity_id: opportunity_id.clone(),
                    similarity_score: similarity,
                    llm_approved,
                    llm_reasoning,
                    created_at: chrono::Utc::now().naive_utc(),
                };
                self.persistence.upsert_match(&m).await?;
                summary.matched += 1;
            }
        }

        Ok(summary)
    }
}

/// Opportunities are keyed by `(provider_name, external_id)` in
/// persistence but matches key on a single [`licita_domain::value_objects::OpportunityId`];
/// the provider key is the stable surrogate until persistence assigns a
/// row id on first save (spec §3, §9: "store IDs and look up, not
/// pointers").
fn opportunity_id(opportunity: &Opportunity) -> licita_domain::value_objects::OpportunityId {
    licita_domain::value_objects::OpportunityId::from_string(format!(
        "{}:{}",
        opportunity.provider_name, opportunity.external_id
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use licita_domain::entities::{Company, OpportunityItem};
    use licita_domain::error::Error;
    use licita_domain::ports::persistence::{BatchSaveResult, PersistenceFilters, PersistenceStats};
    use licita_domain::ports::{CacheProvider, EmbeddingTier};
    use licita_domain::value_objects::{CompanyId, Embedding, OpportunityId};
    use std::sync::Mutex;

    struct InMemoryCache {
        store: Mutex<std::collections::HashMap<String, Vec<u8>>>,
    }
    impl InMemoryCache {
        fn new() -> Self {
            Self { store: Mutex::new(std::collections::HashMap::new()) }
        }
    }
    #[async_trait]
    impl CacheProvider for InMemoryCache {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
            Ok(self.store.lock().unwrap().get(key).cloned())
        }
        async fn set(&self, key: &str, value: Vec<u8>, _ttl: Option<u64>) -> Result<()> {
            self.store.lock().unwrap().insert(key.to_string(), value);
            Ok(())
        }
        async fn scan(&self, prefix: &str) -> Result<Vec<String>> {
            Ok(self.store.lock().unwrap().keys().filter(|k| k.starts_with(prefix)).cloned().collect())
        }
        async fn invalidate(&self, key: &str) -> Result<()> {
            self.store.lock().unwrap().remove(key);
            Ok(())
        }
    }

    /// Produces a similarity of 1.0 for identical text and low similarity
    /// otherwise, by embedding `[len, word_count]`-style features — just
    /// enough signal to exercise the threshold without a real model.
    struct FeatureTier;
    #[async_trait]
    impl EmbeddingTier for FeatureTier {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let contains_office = t.to_lowercase().contains("escritorio") || t.to_lowercase().contains("escritório");
                    let values = if contains_office { vec![1.0, 0.0] } else { vec![0.0, 1.0] };
                    Embedding::new(values, "feature-tier")
                })
                .collect())
        }
        fn model_name(&self) -> &str {
            "feature-tier"
        }
        fn dimensions(&self) -> usize {
            2
        }
        fn tier_name(&self) -> &str {
            "primary"
        }
    }

    struct FakePersistence {
        companies: Vec<Company>,
        opportunities: Mutex<Vec<Opportunity>>,
        matches: Mutex<Vec<Match>>,
    }

    #[async_trait]
    impl PersistenceService for FakePersistence {
        async fn save(&self, _o: &Opportunity) -> Result<bool> {
            Ok(true)
        }
        async fn save_batch(&self, _o: &[Opportunity]) -> Result<BatchSaveResult> {
            Ok(BatchSaveResult::default())
        }
        async fn get(&self, _p: &str, _e: &str) -> Result<Option<Opportunity>> {
            Ok(None)
        }
        async fn get_by_id(&self, _id: &OpportunityId) -> Result<Option<Opportunity>> {
            Ok(None)
        }
        async fn save_items(&self, _id: &OpportunityId, _items: &[OpportunityItem]) -> Result<()> {
            Ok(())
        }
        async fn search(
            &self,
            _provider: Option<&str>,
            _filters: &PersistenceFilters,
            _limit: usize,
            _offset: usize,
        ) -> Result<Vec<Opportunity>> {
            Ok(self.opportunities.lock().unwrap().clone())
        }
        async fn stats(&self) -> Result<PersistenceStats> {
            Err(Error::not_found("unused in test"))
        }
        async fn get_company(&self, id: &CompanyId) -> Result<Option<Company>> {
            Ok(self.companies.iter().find(|c| &c.id == id).cloned())
        }
        async fn list_companies(&self) -> Result<Vec<Company>> {
            Ok(self.companies.clone())
        }
        async fn upsert_match(&self, m: &Match) -> Result<()> {
            self.matches.lock().unwrap().push(m.clone());
            Ok(())
        }
        async fn clear_matches_for_opportunities(&self, _ids: &[OpportunityId]) -> Result<u64> {
            let mut matches = self.matches.lock().unwrap();
            let before = matches.len();
            matches.clear();
            Ok(before as u64)
        }
        async fn has_match(&self, company_id: &CompanyId, opportunity_id: &OpportunityId) -> Result<bool> {
            Ok(self
                .matches
                .lock()
                .unwrap()
                .iter()
                .any(|m| &m.company_id == company_id && &m.opportunity_id == opportunity_id))
        }
        async fn recent_opportunities(&self, _since_days: i64) -> Result<Vec<Opportunity>> {
            Ok(self.opportunities.lock().unwrap().clone())
        }
    }

    fn office_company() -> Company {
        Company {
            id: CompanyId::from_string("c1"),
            legal_name: "Papelaria Acme".to_owned(),
            trade_name: None,
            tax_id: "1".to_owned(),
            description: "fornecedor de material de escritorio".to_owned(),
            products: vec!["papel".to_owned(), "caneta".to_owned()],
            keywords: vec![],
            owner_user_id: None,
        }
    }

    fn opportunity(title: &str, items: Vec<&str>) -> Opportunity {
        Opportunity {
            provider_name: "rest_portal".to_owned(),
            external_id: "1".to_owned(),
            title: title.to_owned(),
            description: String::new(),
            estimated_value: None,
            currency_code: "BRL".to_owned(),
            country_code: "BR".to_owned(),
            region_code: None,
            municipality: None,
            publication_date: None,
            submission_deadline: None,
            opening_date: None,
            procuring_entity_id: None,
            procuring_entity_name: None,
            provider_specific_data: serde_json::Value::Null,
            items: items
                .into_iter()
                .enumerate()
                .map(|(i, desc)| OpportunityItem {
                    item_number: i as i32 + 1,
                    description: desc.to_owned(),
                    quantity: None,
                    unit: None,
                    unit_estimated_value: None,
                    material_or_service: licita_domain::value_objects::MaterialOrService::Material,
                    ncm_code: None,
                    me_epp_exclusive: false,
                })
                .collect(),
            created_at: None,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn matching_pair_above_threshold_without_llm_writes_a_match() {
        let embeddings = Arc::new(EmbeddingService::new(vec![Arc::new(FeatureTier)], Arc::new(InMemoryCache::new())));
        let persistence = Arc::new(FakePersistence {
            companies: vec![office_company()],
            opportunities: Mutex::new(vec![opportunity(
                "aquisição de material de escritorio",
                vec!["papel A4", "caneta esferográfica"],
            )]),
            matches: Mutex::new(Vec::new()),
        });
        let engine = MatchingEngine::new(persistence.clone(), embeddings, None);

        let summary = engine.run_incremental(false).await.unwrap();
        assert_eq!(summary.matched, 1);
        assert_eq!(persistence.matches.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn matching_pair_below_threshold_is_rejected_without_calling_llm() {
        struct PanicValidator;
        #[async_trait]
        impl LlmValidatorProvider for PanicValidator {
            async fn validate(
                &self,
                _c: &Company,
                _o: &Opportunity,
                _s: f32,
            ) -> Result<licita_domain::ports::ValidationVerdict> {
                panic!("must not be called below threshold");
            }
        }

        let embeddings = Arc::new(EmbeddingService::new(vec![Arc::new(FeatureTier)], Arc::new(InMemoryCache::new())));
        let persistence = Arc::new(FakePersistence {
            companies: vec![office_company()],
            opportunities: Mutex::new(vec![opportunity("execução de pavimentação asfáltica", vec![])]),
            matches: Mutex::new(Vec::new()),
        });
        let engine = MatchingEngine::new(persistence.clone(), embeddings, Some(Arc::new(PanicValidator)));

        let summary = engine.run_incremental(true).await.unwrap();
        assert_eq!(summary.matched, 0);
        assert_eq!(summary.rejected_below_threshold, 1);
        assert!(persistence.matches.lock().unwrap().is_empty());
    }
}
