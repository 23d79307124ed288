//! In-process vector store (spec C10): a `Vec<Chunk>` behind a mutex,
//! doing cosine similarity and substring matching by brute force. Fine
//! for local development and the reference deployment's test suite;
//! not meant to survive a restart.

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;

use licita_domain::entities::Chunk;
use licita_domain::error::{Error, Result};
use licita_domain::ports::vector_store::{DocumentVectorizationStatus, VectorStoreProvider, VectorizationStatus};
use licita_domain::registry::{VectorStoreConfig, VectorStoreRegistryEntry, VECTOR_STORES};
use licita_domain::utils::text::normalize;
use licita_domain::value_objects::{cosine_similarity, DocumentId, OpportunityId};

#[derive(Default)]
pub struct InMemoryVectorStore {
    chunks: Mutex<Vec<Chunk>>,
}

impl InMemoryVectorStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStoreProvider for InMemoryVectorStore {
    async fn save_chunks(&self, document_id: &DocumentId, opportunity_id: &OpportunityId, chunks: &[Chunk]) -> Result<()> {
        if chunks.iter().any(|c| c.embedding.is_none()) {
            return Err(Error::vector_store("every chunk must carry an embedding before save_chunks"));
        }
        let mut guard = self.chunks.lock().expect("vector store mutex poisoned");
        guard.retain(|c| &c.document_id != document_id);
        guard.extend(chunks.iter().cloned().map(|mut c| {
            c.opportunity_id = opportunity_id.clone();
            c
        }));
        Ok(())
    }

    async fn count_chunks(&self, document_id: &DocumentId) -> Result<usize> {
        Ok(self.chunks.lock().expect("vector store mutex poisoned").iter().filter(|c| &c.document_id == document_id).count())
    }

    async fn delete_chunks_for_document(&self, document_id: &DocumentId) -> Result<()> {
        self.chunks.lock().expect("vector store mutex poisoned").retain(|c| &c.document_id != document_id);
        Ok(())
    }

    async fn vectorization_status(&self, _opportunity_id: &OpportunityId, document_ids: &[DocumentId]) -> Result<VectorizationStatus> {
        let guard = self.chunks.lock().expect("vector store mutex poisoned");
        let per_document: Vec<DocumentVectorizationStatus> = document_ids
            .iter()
            .map(|document_id| {
                let chunk_count = guard.iter().filter(|c| &c.document_id == document_id).count();
                DocumentVectorizationStatus { document_id: document_id.clone(), chunk_count, fully_vectorized: chunk_count > 0 }
            })
            .collect();
        let fully_vectorized = per_document.iter().all(|d| d.fully_vectorized);
        Ok(VectorizationStatus { fully_vectorized, per_document })
    }

    async fn vector_search(&self, opportunity_id: &OpportunityId, query_embedding: &[f32], limit: usize) -> Result<Vec<(Chunk, f32)>> {
        let guard = self.chunks.lock().expect("vector store mutex poisoned");
        let mut scored: Vec<(Chunk, f32)> = guard
            .iter()
            .filter(|c| &c.opportunity_id == opportunity_id)
            .filter_map(|c| c.embedding.as_ref().map(|e| (c.clone(), cosine_similarity(&e.values, query_embedding))))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn keyword_search(&self, opportunity_id: &OpportunityId, normalized_query_terms: &[String], limit: usize) -> Result<Vec<(Chunk, f32)>> {
        let guard = self.chunks.lock().expect("vector store mutex poisoned");
        let mut scored: Vec<(Chunk, f32)> = guard
            .iter()
            .filter(|c| &c.opportunity_id == opportunity_id)
            .filter_map(|c| {
                let haystack = normalize(&c.text);
                let hits = normalized_query_terms.iter().filter(|t| haystack.contains(t.as_str())).count();
                if hits > 0 {
                    Some((c.clone(), hits as f32 / normalized_query_terms.len().max(1) as f32))
                } else {
                    None
                }
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(limit);
        Ok(scored)
    }
}

fn memory_vector_store_factory(_config: &VectorStoreConfig) -> std::result::Result<Arc<dyn VectorStoreProvider>, String> {
    Ok(Arc::new(InMemoryVectorStore::new()))
}

#[linkme::distributed_slice(VECTOR_STORES)]
static MEMORY_VECTOR_STORE: VectorStoreRegistryEntry = VectorStoreRegistryEntry {
    name: "memory",
    description: "in-process vector store for local development and tests",
    build: memory_vector_store_factory,
};

#[cfg(test)]
mod tests {
    use super::*;
    use licita_domain::value_objects::{ChunkId, ChunkType, Embedding};

    fn chunk(id: &str, opportunity_id: &str, text: &str, embedding: Vec<f32>) -> Chunk {
        Chunk {
            id: ChunkId::from_string(id),
            document_id: DocumentId::from_string("d1"),
            opportunity_id: OpportunityId::from_string(opportunity_id),
            text: text.to_owned(),
            chunk_type: ChunkType::Paragraph,
            page_number: Some(1),
            section_title: None,
            token_count: 5,
            char_count: text.len(),
            embedding: Some(Embedding::new(embedding, "test")),
            metadata: std::collections::HashMap::new(),
        }
    }

    #[tokio::test]
    async fn vector_search_ranks_by_cosine_similarity() {
        let store = InMemoryVectorStore::new();
        let opportunity_id = OpportunityId::from_string("o1");
        let document_id = DocumentId::from_string("d1");
        let chunks = vec![
            chunk("a", "o1", "papel A4", vec![1.0, 0.0]),
            chunk("b", "o1", "caneta", vec![0.0, 1.0]),
        ];
        store.save_chunks(&document_id, &opportunity_id, &chunks).await.unwrap();

        let results = store.vector_search(&opportunity_id, &[1.0, 0.0], 5).await.unwrap();
        assert_eq!(results[0].0.id.as_str(), "a");
    }

    #[tokio::test]
    async fn save_chunks_requires_embeddings() {
        let store = InMemoryVectorStore::new();
        let mut c = chunk("a", "o1", "x", vec![1.0]);
        c.embedding = None;
        let result = store.save_chunks(&DocumentId::from_string("d1"), &OpportunityId::from_string("o1"), &[c]).await;
        assert!(result.is_err());
    }
}
