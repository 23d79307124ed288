//! Retrieval & Answer Engine use case (spec C11 / §4.11).
//!
//! Ensures a tender's documents are vectorized, retrieves a hybrid
//! candidate set, reranks it, and composes a cited answer — short-
//! circuited by an answer cache keyed on `(query, opportunity_id)`.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use serde::{Deserialize, Serialize};

use licita_domain::constants::{RAG_ANSWER_CACHE_TTL_SECONDS, RAG_RERANKED_CHUNKS, RAG_RETRIEVAL_CANDIDATES};
use licita_domain::entities::Chunk;
use licita_domain::error::Result;
use licita_domain::ports::{CacheProvider, DocumentRepository, PersistenceService, RerankProvider, VectorStoreProvider};
use licita_domain::value_objects::{cosine_similarity, OpportunityId};

use crate::use_cases::document_pipeline::DocumentPipeline;
use crate::use_cases::embedding_service::EmbeddingService;

/// One citation in an [`AnswerResult`] (spec §4.11 step 6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerSource {
    pub document_id: String,
    pub document_title: String,
    pub page_number: Option<u32>,
    pub section_title: Option<String>,
}

/// Result of [`RetrievalEngine::answer`]. `answer` is `None` alongside a
/// diagnostic `action` when the pipeline could not produce one (spec §7:
/// "partial RAG answer with an action hint").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResult {
    pub answer: Option<String>,
    pub sources: Vec<AnswerSource>,
    pub chunks_used: usize,
    pub cached: bool,
    pub action: Option<String>,
}

pub struct RetrievalEngine {
    persistence: Arc<dyn PersistenceService>,
    documents: Arc<dyn DocumentRepository>,
    document_pipeline: Arc<DocumentPipeline>,
    vector_store: Arc<dyn VectorStoreProvider>,
    embeddings: Arc<EmbeddingService>,
    reranker: Option<Arc<dyn RerankProvider>>,
    answerer: Arc<dyn licita_domain::ports::AnswerProvider>,
    cache: Arc<dyn CacheProvider>,
}

impl RetrievalEngine {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        persistence: Arc<dyn PersistenceService>,
        documents: Arc<dyn DocumentRepository>,
        document_pipeline: Arc<DocumentPipeline>,
        vector_store: Arc<dyn VectorStoreProvider>,
        embeddings: Arc<EmbeddingService>,
        reranker: Option<Arc<dyn RerankProvider>>,
        answerer: Arc<dyn licita_domain::ports::AnswerProvider>,
        cache: Arc<dyn CacheProvider>,
    ) -> Self {
        Self {
            persistence,
            documents,
            document_pipeline,
            vector_store,
            embeddings,
            reranker,
            answerer,
            cache,
        }
    }

    pub async fn answer(&self, opportunity_id: &OpportunityId, query: &str) -> Result<AnswerResult> {
        let cache_key = answer_cache_key(opportunity_id, query);
        if let Ok(Some(bytes)) = self.cache.get(&cache_key).await {
            if let Ok(mut cached) = serde_json::from_slice::<AnswerResult>(&bytes) {
                cached.cached = true;
                return Ok(cached);
            }
        }

        let Some(opportunity) = self.persistence.get_by_id(opportunity_id).await? else {
            return Ok(not_found_result("opportunity_not_found"));
        };

        if let Err(err) = self
            .ensure_vectorized(opportunity_id, &opportunity.provider_name, &opportunity.external_id)
            .await
        {
            tracing::warn!(error = %err, opportunity_id = %opportunity_id, "vectorization failed before RAG answering");
            return Ok(not_found_result("critical_error"));
        }

        let query_embedding = match self.embeddings.generate_one(query).await? {
            Some(embedding) => embedding,
            None => return Ok(not_found_result("api_error")),
        };

        let candidates = self
            .hybrid_search(opportunity_id, query, &query_embedding.values, RAG_RETRIEVAL_CANDIDATES)
            .await?;
        if candidates.is_empty() {
            return Ok(not_found_result("documents_not_found"));
        }

        let reranked = self.rerank(query, candidates).await?;

        let answer_text = self.answerer.answer(&opportunity, query, &reranked).await?;
        let sources = self.build_sources(&reranked).await;

        let result = AnswerResult {
            answer: Some(answer_text),
            sources,
            chunks_used: reranked.len(),
            cached: false,
            action: None,
        };

        if let Ok(bytes) = serde_json::to_vec(&result) {
            let _ = self.cache.set(&cache_key, bytes, Some(RAG_ANSWER_CACHE_TTL_SECONDS)).await;
        }

        Ok(result)
    }

    /// Runs the extraction → chunk → embed → store pipeline if not every
    /// document of this opportunity is already vectorized (spec §4.11
    /// step 2).
    async fn ensure_vectorized(&self, opportunity_id: &OpportunityId, provider_name: &str, external_id: &str) -> Result<()> {
        let existing = self.documents.list_for_opportunity(opportunity_id).await?;
        let document_ids: Vec<_> = existing.iter().map(|d| d.id.clone()).collect();
        let status = self.vector_store.vectorization_status(opportunity_id, &document_ids).await?;
        if status.fully_vectorized && !document_ids.is_empty() {
            return Ok(());
        }
        self.document_pipeline
            .process_opportunity(provider_name, external_id, opportunity_id)
            .await?;
        Ok(())
    }

    /// Vector search + keyword search, unioned and scored per spec
    /// §4.10: `0.7 * vector_sim + 0.3 * keyword_score`, best-of-two kept
    /// per chunk id.
    async fn hybrid_search(
        &self,
        opportunity_id: &OpportunityId,
        query: &str,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<Chunk>> {
        use licita_domain::constants::{
            HYBRID_SEARCH_CANDIDATE_MULTIPLIER, HYBRID_SEARCH_KEYWORD_WEIGHT, HYBRID_SEARCH_VECTOR_WEIGHT,
        };

        let fetch_limit = limit * HYBRID_SEARCH_CANDIDATE_MULTIPLIER;
        let vector_hits = self.vector_store.vector_search(opportunity_id, query_embedding, fetch_limit).await?;
        let query_terms: Vec<String> = licita_domain::utils::text::normalize(query)
            .split_whitespace()
            .map(str::to_owned)
            .collect();
        let keyword_hits = self.vector_store.keyword_search(opportunity_id, &query_terms, fetch_limit).await?;

        let mut by_id: std::collections::HashMap<String, (Chunk, f32, f32)> = std::collections::HashMap::new();
        for (chunk, score) in vector_hits {
            let entry = by_id.entry(chunk.id.as_str().to_owned()).or_insert((chunk.clone(), 0.0, 0.0));
            entry.1 = entry.1.max(score);
        }
        for (chunk, score) in keyword_hits {
            let entry = by_id.entry(chunk.id.as_str().to_owned()).or_insert((chunk.clone(), 0.0, 0.0));
            entry.2 = entry.2.max(score);
        }

        let mut scored: Vec<(Chunk, f32)> = by_id
            .into_values()
            .map(|(chunk, vector_score, keyword_score)| {
                let final_score = HYBRID_SEARCH_VECTOR_WEIGHT * vector_score + HYBRID_SEARCH_KEYWORD_WEIGHT * keyword_score;
                (chunk, final_score)
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored.into_iter().map(|(chunk, _)| chunk).collect())
    }

    async fn rerank(&self, query: &str, candidates: Vec<Chunk>) -> Result<Vec<Chunk>> {
        let Some(reranker) = &self.reranker else {
            let mut truncated = candidates;
            truncated.truncate(RAG_RERANKED_CHUNKS);
            return Ok(truncated);
        };

        let ranked = reranker.rerank(query, &candidates, RAG_RERANKED_CHUNKS).await?;
        let by_id: std::collections::HashMap<&str, &Chunk> =
            candidates.iter().map(|c| (c.id.as_str(), c)).collect();
        Ok(ranked
            .into_iter()
            .filter_map(|r| by_id.get(r.chunk_id.as_str()).map(|c| (*c).clone()))
            .collect())
    }

    async fn build_sources(&self, chunks: &[Chunk]) -> Vec<AnswerSource> {
        let mut titles = std::collections::HashMap::new();
        let mut sources = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let title = match titles.get(chunk.document_id.as_str()) {
                Some(title) => title,
                None => {
                    let title = self
                        .documents
                        .get(&chunk.document_id)
                        .await
                        .ok()
                        .flatten()
                        .map(|d| d.title)
                        .unwrap_or_else(|| "documento".to_owned());
                    titles.entry(chunk.document_id.as_str().to_owned()).or_insert(title)
                }
            }
            .clone();
            sources.push(AnswerSource {
                document_id: chunk.document_id.as_str().to_owned(),
                document_title: title,
                page_number: chunk.page_number,
                section_title: chunk.section_title.clone(),
            });
        }
        sources
    }
}

fn not_found_result(action: &str) -> AnswerResult {
    AnswerResult {
        answer: None,
        sources: Vec::new(),
        chunks_used: 0,
        cached: false,
        action: Some(action.to_owned()),
    }
}

fn answer_cache_key(opportunity_id: &OpportunityId, query: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(query.trim().to_lowercase().as_bytes());
    format!("answer:{opportunity_id}:{}", hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use licita_domain::entities::{Document, Opportunity};
    use licita_domain::ports::persistence::{BatchSaveResult, PersistenceFilters, PersistenceStats};
    use licita_domain::ports::vector_store::{DocumentVectorizationStatus, VectorizationStatus};
    use licita_domain::ports::{AnswerProvider, AttachmentFetcher, AttachmentRef, DedupProvider, DocumentFingerprint, EmbeddingTier, ObjectStorageProvider, TextExtractionEngine};
    use licita_domain::value_objects::{ChunkId, ChunkType, CompanyId, DocumentId, Embedding, ExtractionStatus};
    use std::sync::Mutex;

    fn sample_chunk(id: &str, doc_id: &str, opp_id: &OpportunityId, text: &str) -> Chunk {
        Chunk {
            id: ChunkId::from_string(id),
            document_id: DocumentId::from_string(doc_id),
            opportunity_id: opp_id.clone(),
            text: text.to_owned(),
            chunk_type: ChunkType::Paragraph,
            page_number: Some(1),
            section_title: None,
            token_count: text.len() / 4,
            char_count: text.len(),
            embedding: Some(Embedding::new(vec![1.0, 0.0], "dummy")),
            metadata: std::collections::HashMap::new(),
        }
    }

    struct FixturePersistence {
        opportunity: Opportunity,
    }
    #[async_trait]
    impl PersistenceService for FixturePersistence {
        async fn save(&self, _o: &Opportunity) -> Result<bool> {
            Ok(true)
        }
        async fn save_batch(&self, _o: &[Opportunity]) -> Result<BatchSaveResult> {
            Ok(BatchSaveResult::default())
        }
        async fn get(&self, _p: &str, _e: &str) -> Result<Option<Opportunity>> {
            Ok(Some(self.opportunity.clone()))
        }
        async fn get_by_id(&self, _id: &OpportunityId) -> Result<Option<Opportunity>> {
            Ok(Some(self.opportunity.clone()))
        }
        async fn save_items(&self, _id: &OpportunityId, _items: &[licita_domain::entities::OpportunityItem]) -> Result<()> {
            Ok(())
        }
        async fn search(&self, _p: Option<&str>, _f: &PersistenceFilters, _l: usize, _o: usize) -> Result<Vec<Opportunity>> {
            Ok(vec![self.opportunity.clone()])
        }
        async fn stats(&self) -> Result<PersistenceStats> {
            Ok(PersistenceStats { total: 1, by_provider: Vec::new() })
        }
        async fn get_company(&self, _id: &CompanyId) -> Result<Option<licita_domain::entities::Company>> {
            Ok(None)
        }
        async fn list_companies(&self) -> Result<Vec<licita_domain::entities::Company>> {
            Ok(Vec::new())
        }
        async fn upsert_match(&self, _m: &licita_domain::entities::Match) -> Result<()> {
            Ok(())
        }
        async fn clear_matches_for_opportunities(&self, _ids: &[OpportunityId]) -> Result<u64> {
            Ok(0)
        }
        async fn has_match(&self, _c: &CompanyId, _o: &OpportunityId) -> Result<bool> {
            Ok(false)
        }
        async fn recent_opportunities(&self, _d: i64) -> Result<Vec<Opportunity>> {
            Ok(Vec::new())
        }
    }

    struct FixtureDocuments {
        doc: Document,
    }
    #[async_trait]
    impl DocumentRepository for FixtureDocuments {
        async fn save(&self, _d: &Document) -> Result<()> {
            Ok(())
        }
        async fn get(&self, _id: &DocumentId) -> Result<Option<Document>> {
            Ok(Some(self.doc.clone()))
        }
        async fn list_for_opportunity(&self, _opportunity_id: &OpportunityId) -> Result<Vec<Document>> {
            Ok(vec![self.doc.clone()])
        }
        async fn update_extraction(&self, _id: &DocumentId, _s: ExtractionStatus, _t: Option<&str>, _e: Option<&str>) -> Result<()> {
            Ok(())
        }
    }

    struct FixtureVectorStore {
        chunks: Vec<Chunk>,
    }
    #[async_trait]
    impl VectorStoreProvider for FixtureVectorStore {
        async fn save_chunks(&self, _d: &DocumentId, _o: &OpportunityId, _c: &[Chunk]) -> Result<()> {
            Ok(())
        }
        async fn count_chunks(&self, _d: &DocumentId) -> Result<usize> {
            Ok(self.chunks.len())
        }
        async fn delete_chunks_for_document(&self, _d: &DocumentId) -> Result<()> {
            Ok(())
        }
        async fn vectorization_status(&self, _o: &OpportunityId, document_ids: &[DocumentId]) -> Result<VectorizationStatus> {
            Ok(VectorizationStatus {
                fully_vectorized: true,
                per_document: document_ids
                    .iter()
                    .map(|id| DocumentVectorizationStatus { document_id: id.clone(), chunk_count: self.chunks.len(), fully_vectorized: true })
                    .collect(),
            })
        }
        async fn vector_search(&self, _o: &OpportunityId, _q: &[f32], limit: usize) -> Result<Vec<(Chunk, f32)>> {
            Ok(self.chunks.iter().take(limit).map(|c| (c.clone(), 0.9)).collect())
        }
        async fn keyword_search(&self, _o: &OpportunityId, _terms: &[String], limit: usize) -> Result<Vec<(Chunk, f32)>> {
            Ok(self.chunks.iter().take(limit).map(|c| (c.clone(), 0.5)).collect())
        }
    }

    struct EchoAnswerer;
    #[async_trait]
    impl AnswerProvider for EchoAnswerer {
        async fn answer(&self, _o: &Opportunity, query: &str, chunks: &[Chunk]) -> Result<String> {
            Ok(format!("resposta para '{query}' usando {} trechos", chunks.len()))
        }
    }

    struct DummyCache {
        store: Mutex<std::collections::HashMap<String, Vec<u8>>>,
    }
    #[async_trait]
    impl CacheProvider for DummyCache {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
            Ok(self.store.lock().unwrap().get(key).cloned())
        }
        async fn set(&self, key: &str, value: Vec<u8>, _ttl: Option<u64>) -> Result<()> {
            self.store.lock().unwrap().insert(key.to_owned(), value);
            Ok(())
        }
        async fn scan(&self, _prefix: &str) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
        async fn invalidate(&self, key: &str) -> Result<()> {
            self.store.lock().unwrap().remove(key);
            Ok(())
        }
    }

    struct DummyTier;
    #[async_trait]
    impl EmbeddingTier for DummyTier {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
            Ok(texts.iter().map(|_| Embedding::new(vec![1.0, 0.0], "dummy")).collect())
        }
        fn model_name(&self) -> &str {
            "dummy"
        }
        fn dimensions(&self) -> usize {
            2
        }
        fn tier_name(&self) -> &str {
            "primary"
        }
    }

    struct UnusedAttachments;
    #[async_trait]
    impl AttachmentFetcher for UnusedAttachments {
        async fn list_attachments(&self, _p: &str, _e: &str) -> Result<Vec<AttachmentRef>> {
            Ok(Vec::new())
        }
        async fn download(&self, _url: &str) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
    }
    struct UnusedStorage;
    #[async_trait]
    impl ObjectStorageProvider for UnusedStorage {
        async fn put(&self, _k: &str, _b: Vec<u8>, _c: &str) -> Result<String> {
            Ok(String::new())
        }
        async fn get(&self, _k: &str) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
        async fn exists(&self, _k: &str) -> Result<bool> {
            Ok(false)
        }
        async fn delete(&self, _k: &str) -> Result<()> {
            Ok(())
        }
    }
    struct UnusedDedup;
    #[async_trait]
    impl DedupProvider for UnusedDedup {
        async fn should_process(&self, _id: &DocumentId, _fp: &DocumentFingerprint) -> Result<bool> {
            Ok(false)
        }
        async fn mark_processed(&self, _id: &DocumentId, _fp: &DocumentFingerprint) -> Result<()> {
            Ok(())
        }
    }

    fn opportunity() -> Opportunity {
        Opportunity {
            provider_name: "rest_portal".to_owned(),
            external_id: "1".to_owned(),
            title: "Aquisição de materiais".to_owned(),
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
            items: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }

    fn engine_with_chunks(chunks: Vec<Chunk>, cache: Arc<DummyCache>) -> RetrievalEngine {
        let opportunity_id = OpportunityId::from_string("opp-1");
        let doc = Document {
            id: DocumentId::from_string("doc-1"),
            opportunity_id: opportunity_id.clone(),
            title: "edital.pdf".to_owned(),
            storage_url: String::new(),
            size_bytes: 0,
            content_hash: "h".to_owned(),
            mime_type: "application/pdf".to_owned(),
            extraction_status: ExtractionStatus::Done,
            extracted_text: None,
            extraction_engine: None,
        };
        let document_pipeline = Arc::new(DocumentPipeline::new(
            Arc::new(UnusedAttachments),
            Vec::<Arc<dyn TextExtractionEngine>>::new(),
            Arc::new(UnusedStorage),
            Arc::new(FixtureDocuments { doc: doc.clone() }),
            Arc::new(UnusedDedup),
            Arc::new(EmbeddingService::new(vec![Arc::new(DummyTier)], cache.clone())),
            Arc::new(FixtureVectorStore { chunks: chunks.clone() }),
        ));

        RetrievalEngine::new(
            Arc::new(FixturePersistence { opportunity: opportunity() }),
            Arc::new(FixtureDocuments { doc }),
            document_pipeline,
            Arc::new(FixtureVectorStore { chunks }),
            Arc::new(EmbeddingService::new(vec![Arc::new(DummyTier)], cache.clone())),
            None,
            Arc::new(EchoAnswerer),
            cache,
        )
    }

    #[tokio::test]
    async fn answers_from_retrieved_chunks() {
        let opportunity_id = OpportunityId::from_string("opp-1");
        let chunk = sample_chunk("chunk-1", "doc-1", &opportunity_id, "A data de abertura é 10/10/2026.");
        let cache = Arc::new(DummyCache { store: Mutex::new(std::collections::HashMap::new()) });
        let engine = engine_with_chunks(vec![chunk], cache);

        let result = engine.answer(&opportunity_id, "qual a data de abertura?").await.unwrap();
        assert!(result.answer.is_some());
        assert!(!result.cached);
        assert_eq!(result.sources.len(), 1);
    }

    #[tokio::test]
    async fn second_identical_query_is_served_from_cache() {
        let opportunity_id = OpportunityId::from_string("opp-1");
        let chunk = sample_chunk("chunk-1", "doc-1", &opportunity_id, "A data de abertura é 10/10/2026.");
        let cache = Arc::new(DummyCache { store: Mutex::new(std::collections::HashMap::new()) });
        let engine = engine_with_chunks(vec![chunk], cache);

        let first = engine.answer(&opportunity_id, "qual a data de abertura?").await.unwrap();
        let second = engine.answer(&opportunity_id, "qual a data de abertura?").await.unwrap();
        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(first.answer, second.answer);
    }

    #[tokio::test]
    async fn no_candidates_returns_documents_not_found_action() {
        let opportunity_id = OpportunityId::from_string("opp-1");
        let cache = Arc::new(DummyCache { store: Mutex::new(std::collections::HashMap::new()) });
        let engine = engine_with_chunks(Vec::new(), cache);

        let result = engine.answer(&opportunity_id, "qual a data de abertura?").await.unwrap();
        assert!(result.answer.is_none());
        assert_eq!(result.action.as_deref(), Some("documents_not_found"));
    }
}
