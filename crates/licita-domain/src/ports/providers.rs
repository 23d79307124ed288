//! Provider Adapter port (spec C1 / §4.1).
//!
//! A provider adapter speaks one upstream source's protocol and yields
//! normalized [`Opportunity`] rows. New sources are added by implementing
//! this trait and wiring the adapter into the composition root alongside
//! a matching [`crate::ports::mapper::DataMapper`] — no other component
//! is modified (spec §9).

use std::collections::HashMap;

use async_trait::async_trait;

use crate::entities::{Opportunity, OpportunityItem};
use crate::error::Result;
use crate::value_objects::SearchFilters;

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Returns every opportunity matching `filters`, across pages,
    /// deduplicated by `external_id` within the call (first-seen wins).
    async fn search(&self, filters: &SearchFilters) -> Result<Vec<Opportunity>>;

    /// Full record for one external id. May be identical to the search
    /// result for some providers; `None` when not found.
    async fn get_details(&self, external_id: &str) -> Result<Option<Opportunity>>;

    /// The tender's shopping list.
    async fn get_items(&self, external_id: &str) -> Result<Vec<OpportunityItem>>;

    /// Lowercase provider tag used as the first half of the primary key.
    fn provider_name(&self) -> &str;

    /// Free-form metadata surfaced by `provider_stats` (spec §4.4).
    fn metadata(&self) -> HashMap<String, serde_json::Value> {
        HashMap::new()
    }
}
