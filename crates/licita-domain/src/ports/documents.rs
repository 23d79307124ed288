//! Document repository port: persists the `documents` table backing the
//! Document Extractor (spec C8, §6 persisted state layout). Kept separate
//! from [`crate::ports::persistence::PersistenceService`], which owns the
//! opportunity/company/match tables, since documents live on the RAG side
//! of the schema and are written by a different pipeline.

use async_trait::async_trait;

use crate::entities::Document;
use crate::error::Result;
use crate::value_objects::{DocumentId, OpportunityId};

#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn save(&self, document: &Document) -> Result<()>;

    async fn get(&self, id: &DocumentId) -> Result<Option<Document>>;

    async fn list_for_opportunity(&self, opportunity_id: &OpportunityId) -> Result<Vec<Document>>;

    async fn update_extraction(
        &self,
        id: &DocumentId,
        status: crate::value_objects::ExtractionStatus,
        extracted_text: Option<&str>,
        extraction_engine: Option<&str>,
    ) -> Result<()>;
}
