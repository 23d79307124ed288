//! Dedup Service port (spec C14 / §4.14).
//!
//! Backed by the `rag_document_processed` table (spec §6): one row per
//! document that has ever been successfully vectorized, keyed by
//! `document_id` and carrying the `content_hash` it was processed under.

use async_trait::async_trait;

use crate::error::Result;
use crate::value_objects::DocumentId;

/// Identifying facts about a document's current bytes, used to decide
/// whether reprocessing is necessary.
#[derive(Debug, Clone)]
pub struct DocumentFingerprint {
    pub url: String,
    pub size_bytes: u64,
    pub content_hash: String,
}

#[async_trait]
pub trait DedupProvider: Send + Sync {
    /// `true` if no chunks exist for this document yet, OR the stored
    /// `content_hash` differs from `fingerprint.content_hash`.
    async fn should_process(
        &self,
        document_id: &DocumentId,
        fingerprint: &DocumentFingerprint,
    ) -> Result<bool>;

    /// Records that `document_id` was processed under `fingerprint` at
    /// `now`, so a subsequent unchanged re-ingestion skips reprocessing.
    async fn mark_processed(
        &self,
        document_id: &DocumentId,
        fingerprint: &DocumentFingerprint,
    ) -> Result<()>;
}
