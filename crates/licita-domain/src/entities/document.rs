//! Tender attachment entity (spec §3).

use serde::{Deserialize, Serialize};

use crate::value_objects::{DocumentId, ExtractionStatus, OpportunityId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub opportunity_id: OpportunityId,
    pub title: String,
    pub storage_url: String,
    pub size_bytes: u64,
    /// Hex-encoded SHA-256 of the raw bytes.
    pub content_hash: String,
    pub mime_type: String,
    pub extraction_status: ExtractionStatus,
    pub extracted_text: Option<String>,
    /// Which extractor engine produced `extracted_text` ("markdown",
    /// "pdf_a", "pdf_b"), for observability (spec §4.8).
    pub extraction_engine: Option<String>,
}

impl Document {
    /// Page count implied by the `--- PAGE N ---` markers in the extracted
    /// text, if any were emitted.
    #[must_use]
    pub fn page_numbers(&self) -> Vec<u32> {
        let Some(text) = &self.extracted_text else {
            return Vec::new();
        };
        crate::utils::text::extract_page_markers(text)
    }
}
