//! Chunk entity — a bounded, overlapping text span (spec §3, §4.9).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::value_objects::{ChunkId, ChunkType, DocumentId, Embedding, OpportunityId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub document_id: DocumentId,
    pub opportunity_id: OpportunityId,
    pub text: String,
    pub chunk_type: ChunkType,
    pub page_number: Option<u32>,
    pub section_title: Option<String>,
    pub token_count: usize,
    pub char_count: usize,
    pub embedding: Option<Embedding>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Chunk {
    /// `true` when this chunk was formed by prepending overlap text from
    /// its predecessor (spec §4.9 step 5).
    #[must_use]
    pub fn has_overlap(&self) -> bool {
        self.metadata
            .get("has_overlap")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }
}
