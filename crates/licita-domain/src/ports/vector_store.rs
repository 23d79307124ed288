//! Vector Store port (spec C10 / §4.10).

use async_trait::async_trait;

use crate::entities::Chunk;
use crate::error::Result;
use crate::value_objects::{DocumentId, OpportunityId};

#[derive(Debug, Clone)]
pub struct DocumentVectorizationStatus {
    pub document_id: DocumentId,
    pub chunk_count: usize,
    pub fully_vectorized: bool,
}

#[derive(Debug, Clone)]
pub struct VectorizationStatus {
    pub fully_vectorized: bool,
    pub per_document: Vec<DocumentVectorizationStatus>,
}

#[async_trait]
pub trait VectorStoreProvider: Send + Sync {
    /// Transactional: rejects if `chunks.len() != embeddings are already
    /// attached to each chunk`, i.e. every chunk must carry an embedding
    /// before this call.
    async fn save_chunks(
        &self,
        document_id: &DocumentId,
        opportunity_id: &OpportunityId,
        chunks: &[Chunk],
    ) -> Result<()>;

    async fn count_chunks(&self, document_id: &DocumentId) -> Result<usize>;

    async fn delete_chunks_for_document(&self, document_id: &DocumentId) -> Result<()>;

    async fn vectorization_status(
        &self,
        opportunity_id: &OpportunityId,
        document_ids: &[DocumentId],
    ) -> Result<VectorizationStatus>;

    /// Vector-only similarity search within one opportunity, used as the
    /// first stage of hybrid search.
    async fn vector_search(
        &self,
        opportunity_id: &OpportunityId,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<(Chunk, f32)>>;

    /// Substring keyword search within one opportunity, used as the second
    /// stage of hybrid search.
    async fn keyword_search(
        &self,
        opportunity_id: &OpportunityId,
        normalized_query_terms: &[String],
        limit: usize,
    ) -> Result<Vec<(Chunk, f32)>>;
}
