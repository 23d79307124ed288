//! Derived / classification enums shared across entities.

use serde::{Deserialize, Serialize};

/// Derived opportunity status (spec §3): computed from `submission_deadline`
/// versus wall clock, never stored directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityStatus {
    Open,
    Closed,
    Undefined,
}

/// Whether an opportunity item is a material (good) or a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialOrService {
    Material,
    Service,
}

/// Document extraction lifecycle (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    Pending,
    Processing,
    Done,
    Failed,
}

/// Structural classification of a chunk (spec §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    Title,
    Subtitle,
    Paragraph,
    List,
    Table,
}
