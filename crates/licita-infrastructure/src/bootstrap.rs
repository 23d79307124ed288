//! Composition root (spec §9 "global state"): the one place that knows
//! about every concrete provider type in `licita-providers` and wires
//! them behind the `licita-domain` ports into a single [`CoreFacade`].
//! Everything downstream of [`bootstrap`] only ever sees `dyn Trait`
//! objects — the unified search service and the data-mapper registry
//! are process-singletons assembled once here, per SPEC_FULL.md §2.

use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;

use licita_domain::error::{Error, Result};
use licita_domain::ports::{CacheProvider, ProviderAdapter, TextExtractionEngine};
use licita_domain::registry::{
    build_extraction_engines, resolve_embedding_tier, resolve_llm_provider, resolve_vector_store,
    EmbeddingTierConfig, ExtractionEngineConfig, LlmProviderConfig, VectorStoreConfig,
};

use licita_application::use_cases::document_pipeline::DocumentPipeline;
use licita_application::use_cases::embedding_service::EmbeddingService;
use licita_application::use_cases::facade::CoreFacade;
use licita_application::use_cases::matching_engine::MatchingEngine;
use licita_application::use_cases::retrieval_engine::RetrievalEngine;
use licita_application::use_cases::synonym_service::SynonymService;
use licita_application::use_cases::unified_search::UnifiedSearchService;

use licita_providers::attachments::HttpAttachmentFetcher;
use licita_providers::cache::{MokaCacheProvider, RedisCacheProvider};
use licita_providers::dedup::SqlDedupProvider;
use licita_providers::llm::{LlmAnswerProvider, LlmRerankProvider, LlmSynonymProvider, LlmValidator};
use licita_providers::providers::{RestPortalAdapter, RestPortalConfig, ScrapePortalAdapter, ScrapePortalConfig};
use licita_providers::storage::FilesystemStorageProvider;
use licita_providers::vector_store::PgVectorStore;

use crate::config::LicitaConfig;
use crate::persistence::{PgDocumentRepository, PgPersistenceService};

/// Everything [`bootstrap`] built, kept alive for the lifetime of the
/// process. `facade` is what every inbound transport (CLI, and any
/// future HTTP layer per spec §1 Non-goals) should talk to; the rest are
/// exposed for callers that need a lower-level handle (migrations,
/// health checks).
pub struct AppContext {
    pub facade: Arc<CoreFacade>,
    pub db_pool: sqlx::PgPool,
    pub cache: Arc<dyn CacheProvider>,
}

/// Builds the full dependency graph from a loaded [`LicitaConfig`].
///
/// # Errors
///
/// Returns [`Error::Configuration`] if a registered provider name in
/// `config` is unknown, or [`Error::Database`] if the database pool
/// cannot be established.
pub async fn bootstrap(config: &LicitaConfig) -> Result<AppContext> {
    let db_pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&config.database_url)
        .await
        .map_err(|e| Error::database(e.to_string()))?;

    let cache: Arc<dyn CacheProvider> = match config.cache.backend.as_str() {
        "redis" => {
            let url = config.cache.url.clone().ok_or_else(|| Error::config("cache.url is required for the redis backend"))?;
            Arc::new(RedisCacheProvider::connect(&url).await?)
        }
        _ => Arc::new(MokaCacheProvider::new(config.cache.max_capacity)),
    };

    let rest_adapter = Arc::new(RestPortalAdapter::new(
        RestPortalConfig {
            base_url: config.providers.rest_portal.base_url.clone().unwrap_or_else(|| RestPortalConfig::default().base_url),
            detail_base_url: config.providers.rest_portal.detail_base_url.clone().unwrap_or_else(|| RestPortalConfig::default().detail_base_url),
            ..RestPortalConfig::default()
        },
        cache.clone(),
    ));
    let scrape_adapter = Arc::new(ScrapePortalAdapter::new(
        ScrapePortalConfig {
            results_url: config.providers.scrape_portal.results_url.clone().unwrap_or_else(|| ScrapePortalConfig::default().results_url),
            item_fetch_base_url: config
                .providers
                .scrape_portal
                .item_fetch_base_url
                .clone()
                .unwrap_or_else(|| ScrapePortalConfig::default().item_fetch_base_url),
            ..ScrapePortalConfig::default()
        },
        cache.clone(),
    ));
    let adapters: Vec<Arc<dyn ProviderAdapter>> = vec![rest_adapter.clone(), scrape_adapter.clone()];

    let llm_config = LlmProviderConfig {
        provider: config.providers.llm.provider.clone(),
        model: config.providers.llm.model.clone(),
        api_key: config.providers.llm.api_key.clone(),
        base_url: config.providers.llm.base_url.clone(),
        extra: Default::default(),
    };
    // Synonym expansion, validation, rerank and answering all run over
    // the same chat-completion backend (spec §9: one concrete provider
    // can serve all four semantic ports).
    let llm_available = config.providers.llm.api_key.is_some() && config.providers.llm.base_url.is_some();
    let chat = if llm_available { Some(resolve_llm_provider(&config.providers.llm.provider, &llm_config)?) } else { None };

    let synonyms = Arc::new(SynonymService::new(
        chat.clone().map(|c| Arc::new(LlmSynonymProvider::new(c)) as Arc<dyn licita_domain::ports::SynonymProvider>).unwrap_or_else(|| Arc::new(NoopSynonymProvider)),
        cache.clone(),
    ));
    let search = Arc::new(UnifiedSearchService::new(adapters.clone(), synonyms));

    let mut embedding_tiers = Vec::new();
    if let Some(api_key) = config.providers.embedding.primary.api_key.clone() {
        let mut extra = std::collections::HashMap::new();
        extra.insert("tier_name".to_owned(), "primary".to_owned());
        let tier_config = EmbeddingTierConfig {
            provider: config.providers.embedding.primary.provider.clone(),
            model: config.providers.embedding.primary.model.clone(),
            api_key: Some(api_key),
            base_url: config.providers.embedding.primary.base_url.clone(),
            dimensions: config.providers.embedding.primary.dimensions,
            cache_dir: None,
            extra,
        };
        embedding_tiers.push(resolve_embedding_tier(&config.providers.embedding.primary.provider, &tier_config)?);
    }
    if let Some(api_key) = config.providers.embedding.secondary.api_key.clone() {
        let mut extra = std::collections::HashMap::new();
        extra.insert("tier_name".to_owned(), "secondary".to_owned());
        let tier_config = EmbeddingTierConfig {
            provider: config.providers.embedding.secondary.provider.clone(),
            model: config.providers.embedding.secondary.model.clone(),
            api_key: Some(api_key),
            base_url: config.providers.embedding.secondary.base_url.clone(),
            dimensions: config.providers.embedding.secondary.dimensions,
            cache_dir: None,
            extra,
        };
        embedding_tiers.push(resolve_embedding_tier(&config.providers.embedding.secondary.provider, &tier_config)?);
    }
    // Local tier is always available as a last resort (spec §4.5), as
    // long as the fastembed ONNX model can be loaded.
    let local_config = EmbeddingTierConfig { cache_dir: config.providers.embedding.local_cache_dir.clone(), ..Default::default() };
    if let Ok(local_tier) = resolve_embedding_tier("fastembed_local", &local_config) {
        embedding_tiers.push(local_tier);
    }
    if embedding_tiers.is_empty() {
        return Err(Error::config("no embedding tier could be constructed: configure at least one of primary/secondary API keys, or ensure the local fastembed model is reachable"));
    }
    let embeddings = Arc::new(EmbeddingService::new(embedding_tiers, cache.clone()));

    let validator: Option<Arc<dyn licita_domain::ports::LlmValidatorProvider>> = chat.clone().map(|c| Arc::new(LlmValidator::new(c)) as Arc<_>);
    let persistence = Arc::new(PgPersistenceService::new(db_pool.clone(), &["rest_portal", "scrape_portal"])?);
    let matching = Arc::new(MatchingEngine::new(persistence.clone(), embeddings.clone(), validator));

    let documents = Arc::new(PgDocumentRepository::new(db_pool.clone()));
    let vector_store_config = VectorStoreConfig { provider: config.providers.vector_store.provider.clone(), dsn: config.providers.vector_store.dsn.clone(), extra: Default::default() };
    let vector_store = match config.providers.vector_store.provider.as_str() {
        "pgvector" => {
            let dsn = config.providers.vector_store.dsn.clone().ok_or_else(|| Error::config("providers.vector_store.dsn is required for the pgvector backend"))?;
            Arc::new(PgVectorStore::connect(&dsn).await?) as Arc<dyn licita_domain::ports::VectorStoreProvider>
        }
        other => resolve_vector_store(other, &vector_store_config)?,
    };

    let mut extraction_chain = build_extraction_engines(&ExtractionEngineConfig::default());
    extraction_chain.sort_by_key(|engine| std::cmp::Reverse(engine.priority()));
    let dedup = Arc::new(SqlDedupProvider::new(db_pool.clone()));
    let storage = Arc::new(FilesystemStorageProvider::new(config.providers.storage.root.clone()));
    let attachments = Arc::new(HttpAttachmentFetcher::new(config.providers.rest_portal.detail_base_url.clone().unwrap_or_else(|| RestPortalConfig::default().detail_base_url)));

    let document_pipeline = Arc::new(DocumentPipeline::new(
        attachments,
        extraction_chain,
        storage,
        documents.clone() as Arc<dyn licita_domain::ports::DocumentRepository>,
        dedup,
        embeddings.clone(),
        vector_store.clone(),
    ));

    let reranker: Option<Arc<dyn licita_domain::ports::RerankProvider>> = chat.clone().map(|c| Arc::new(LlmRerankProvider::new(c)) as Arc<_>);
    let answerer: Arc<dyn licita_domain::ports::AnswerProvider> = match &chat {
        Some(c) => Arc::new(LlmAnswerProvider::new(c.clone())),
        None => Arc::new(NoopAnswerProvider),
    };

    let retrieval = Arc::new(RetrievalEngine::new(
        persistence.clone() as Arc<dyn licita_domain::ports::PersistenceService>,
        documents.clone() as Arc<dyn licita_domain::ports::DocumentRepository>,
        document_pipeline,
        vector_store.clone(),
        embeddings,
        reranker,
        answerer,
        cache.clone(),
    ));

    let facade = Arc::new(CoreFacade::new(
        search,
        matching,
        retrieval,
        adapters,
        persistence as Arc<dyn licita_domain::ports::PersistenceService>,
        documents as Arc<dyn licita_domain::ports::DocumentRepository>,
        vector_store,
    ));

    Ok(AppContext { facade, db_pool, cache })
}

/// Used when no `providers.llm.api_key`/`base_url` is configured: the
/// Synonym Service (C6) degrades to "no expansion" rather than the
/// caller having to special-case a missing LLM everywhere (spec §7:
/// "missing cache must never break functionality"; the same tolerance
/// is extended here to a missing LLM credential).
struct NoopSynonymProvider;

#[async_trait::async_trait]
impl licita_domain::ports::SynonymProvider for NoopSynonymProvider {
    async fn expand(&self, term: &str, _max: usize) -> Result<Vec<String>> {
        Ok(vec![term.to_owned()])
    }
}

/// Used when no LLM is configured: RAG answering without an LLM can't
/// produce a grounded answer, so it reports the diagnostic `action`
/// spec §7 calls for rather than failing the whole call.
struct NoopAnswerProvider;

#[async_trait::async_trait]
impl licita_domain::ports::AnswerProvider for NoopAnswerProvider {
    async fn answer(&self, _opportunity: &licita_domain::entities::Opportunity, _query: &str, _chunks: &[licita_domain::entities::Chunk]) -> Result<String> {
        Err(Error::config("no LLM provider configured (providers.llm.api_key/base_url); cannot compose an answer"))
    }
}
