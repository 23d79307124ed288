//! Company-opportunity match entity (spec §3).

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::value_objects::{CompanyId, OpportunityId};

/// A scored pairing between one company and one opportunity. At most one
/// row exists per `(company_id, opportunity_id)` (spec invariant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub company_id: CompanyId,
    pub opportunity_id: OpportunityId,
    pub similarity_score: f32,
    pub llm_approved: Option<bool>,
    pub llm_reasoning: Option<String>,
    pub created_at: NaiveDateTime,
}
