//! Cross-provider search filters (spec §4.1).

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Sort order for [`SearchFilters::sort_order`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Ascending.
    Asc,
    /// Descending (default — most recent/valuable first).
    #[default]
    Desc,
}

/// Filters accepted by every provider adapter's `search` operation.
///
/// All fields optional; an adapter ignores filters it cannot express on the
/// wire and applies the rest locally (see the REST adapter's region-filter
/// workaround in spec §4.1).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilters {
    /// Free-text keywords. By the time this reaches an adapter it may
    /// already be a disjunction of quoted phrases produced by synonym
    /// expansion (spec §4.4) — adapters substring-match each quoted term.
    pub keywords: Option<String>,
    pub region_code: Option<String>,
    pub country_code: Option<String>,
    pub min_value: Option<Decimal>,
    pub max_value: Option<Decimal>,
    pub currency_code: Option<String>,
    pub publication_date_from: Option<NaiveDateTime>,
    pub publication_date_to: Option<NaiveDateTime>,
    pub submission_deadline_from: Option<NaiveDateTime>,
    pub submission_deadline_to: Option<NaiveDateTime>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub sort_by: Option<String>,
    pub sort_order: Option<SortOrder>,
}

impl SearchFilters {
    /// Splits `keywords` on the synonym-expansion `OR` convention
    /// (`"t1" OR "t2" OR …`) into individual quoted terms. Falls back to a
    /// single term (the whole string) when the convention isn't present.
    #[must_use]
    pub fn keyword_terms(&self) -> Vec<String> {
        let Some(raw) = &self.keywords else {
            return Vec::new();
        };
        if !raw.contains(" OR ") {
            return vec![raw.trim().trim_matches('"').to_owned()];
        }
        raw.split(" OR ")
            .map(|term| term.trim().trim_matches('"').to_owned())
            .filter(|term| !term.is_empty())
            .collect()
    }
}
