//! Opportunity (normalized tender) — the lingua franca between provider
//! adapters and persistence (spec §3).

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::value_objects::{MaterialOrService, OpportunityStatus};

/// One line of a tender's shopping list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpportunityItem {
    pub item_number: i32,
    pub description: String,
    pub quantity: Option<Decimal>,
    pub unit: Option<String>,
    pub unit_estimated_value: Option<Decimal>,
    pub material_or_service: MaterialOrService,
    /// Classification code (e.g. NCM); `None` when the source doesn't
    /// supply one.
    pub ncm_code: Option<String>,
    /// Reserved for small-business (`ME`/`EPP`) bidders.
    pub me_epp_exclusive: bool,
}

/// A normalized public-procurement opportunity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    // Identity
    pub provider_name: String,
    pub external_id: String,

    // Descriptive
    pub title: String,
    pub description: String,

    // Money
    pub estimated_value: Option<Decimal>,
    pub currency_code: String,

    // Location
    pub country_code: String,
    pub region_code: Option<String>,
    pub municipality: Option<String>,

    // Timeline
    pub publication_date: Option<NaiveDateTime>,
    pub submission_deadline: Option<NaiveDateTime>,
    pub opening_date: Option<NaiveDateTime>,

    // Counterparty
    pub procuring_entity_id: Option<String>,
    pub procuring_entity_name: Option<String>,

    /// Schemaless provider-specific blob, preserved verbatim for display.
    /// Cross-provider code must never read into this; only typed fields
    /// above are portable (spec §9).
    pub provider_specific_data: serde_json::Value,

    /// Items are fetched separately (`get_items`) but travel with the
    /// opportunity once loaded, so downstream consumers (matching,
    /// persistence) don't need a second round trip.
    #[serde(default)]
    pub items: Vec<OpportunityItem>,

    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl Opportunity {
    /// Derived status from `submission_deadline` vs `now` (spec §3): a
    /// tender is `closed` from one day before its deadline onward.
    #[must_use]
    pub fn status(&self, now: NaiveDateTime) -> OpportunityStatus {
        match self.submission_deadline {
            None => OpportunityStatus::Undefined,
            Some(deadline) => {
                let closes_at = deadline - chrono::Duration::days(1);
                if now >= closes_at {
                    OpportunityStatus::Closed
                } else {
                    OpportunityStatus::Open
                }
            }
        }
    }

    /// Text representation used for embedding in the matching engine (spec
    /// §4.7 step 1): title + description + item descriptions, joined
    /// exactly as the original Python service does (`"; "` between item
    /// descriptions) so re-embeddings stay stable across re-runs.
    #[must_use]
    pub fn vectorizable_text(&self) -> String {
        let items_text = self
            .items
            .iter()
            .map(|item| item.description.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        if items_text.is_empty() {
            format!("{} {}", self.title, self.description)
        } else {
            format!("{} {} {}", self.title, self.description, items_text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_opportunity(deadline: Option<NaiveDateTime>) -> Opportunity {
        Opportunity {
            provider_name: "rest_portal".to_owned(),
            external_id: "1".to_owned(),
            title: "t".to_owned(),
            description: "d".to_owned(),
            estimated_value: None,
            currency_code: "BRL".to_owned(),
            country_code: "BR".to_owned(),
            region_code: None,
            municipality: None,
            publication_date: None,
            submission_deadline: deadline,
            opening_date: None,
            procuring_entity_id: None,
            procuring_entity_name: None,
            provider_specific_data: serde_json::Value::Null,
            items: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn status_undefined_without_deadline() {
        let o = base_opportunity(None);
        let now = chrono::NaiveDate::from_ymd_opt(2026, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(o.status(now), OpportunityStatus::Undefined);
    }

    #[test]
    fn status_closed_one_day_before_deadline() {
        let deadline = chrono::NaiveDate::from_ymd_opt(2026, 1, 10)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let o = base_opportunity(Some(deadline));

        let still_open = chrono::NaiveDate::from_ymd_opt(2026, 1, 8)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert_eq!(o.status(still_open), OpportunityStatus::Open);

        let now_closed = chrono::NaiveDate::from_ymd_opt(2026, 1, 9)
            .unwrap()
            .and_hms_opt(12, 0, 1)
            .unwrap();
        assert_eq!(o.status(now_closed), OpportunityStatus::Closed);
    }

    #[test]
    fn vectorizable_text_joins_items_with_semicolons() {
        let mut o = base_opportunity(None);
        o.items.push(OpportunityItem {
            item_number: 1,
            description: "papel A4".to_owned(),
            quantity: None,
            unit: None,
            unit_estimated_value: None,
            material_or_service: MaterialOrService::Material,
            ncm_code: None,
            me_epp_exclusive: false,
        });
        o.items.push(OpportunityItem {
            item_number: 2,
            description: "caneta esferográfica".to_owned(),
            quantity: None,
            unit: None,
            unit_estimated_value: None,
            material_or_service: MaterialOrService::Material,
            ncm_code: None,
            me_epp_exclusive: false,
        });
        assert_eq!(
            o.vectorizable_text(),
            "t d papel A4; caneta esferográfica"
        );
    }
}
