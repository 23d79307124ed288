//! Data Mapper Registry port (spec C2 / §4.2).

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::entities::Opportunity;
use crate::error::Result;

/// Flat structure matching the persistence schema — the shape a
/// [`DataMapper`] converts to/from. Kept separate from [`Opportunity`] so a
/// provider's on-the-wire quirks never leak into the normalized type.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OpportunityRow {
    pub provider_name: String,
    pub external_id: String,
    pub title: String,
    pub description: String,
    pub estimated_value: Option<Decimal>,
    pub currency_code: String,
    pub country_code: String,
    pub region_code: Option<String>,
    pub municipality: Option<String>,
    pub publication_date: Option<NaiveDateTime>,
    pub submission_deadline: Option<NaiveDateTime>,
    pub opening_date: Option<NaiveDateTime>,
    pub procuring_entity_id: Option<String>,
    pub procuring_entity_name: Option<String>,
    pub provider_specific_data: serde_json::Value,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

/// Per-provider bidirectional conversion between a normalized [`Opportunity`]
/// and its persisted row.
pub trait DataMapper: Send + Sync {
    /// Provider-specific required-field check, run before persistence.
    fn validate(&self, opportunity: &Opportunity) -> bool;

    fn opportunity_to_row(&self, opportunity: &Opportunity) -> OpportunityRow;

    fn row_to_opportunity(&self, row: &OpportunityRow) -> Result<Opportunity>;

    fn provider_name(&self) -> &str;
}
