//! Data Mappers (spec C2): one [`DataMapper`] per provider adapter,
//! converting between the normalized [`Opportunity`] and the flat
//! [`OpportunityRow`] the persistence layer stores.
//!
//! Both mappers here are intentionally dumb: all provider-specific
//! parsing already happened in the [`crate::providers`] adapter that
//! produced the [`Opportunity`] in the first place. What's left is
//! required-field validation and the straight field-for-field
//! conversion, plus round-tripping `items` through
//! `provider_specific_data["items"]` since [`OpportunityRow`] has no
//! column for them (items are persisted separately, spec §6).

use std::sync::Arc;

use licita_domain::entities::{Opportunity, OpportunityItem};
use licita_domain::error::Result;
use licita_domain::ports::mapper::{DataMapper, OpportunityRow};
use licita_domain::registry::{MapperConfig, MapperRegistryEntry, DATA_MAPPERS};

/// Shared conversion logic; only `provider_name()` differs between the
/// two registered mappers, so one struct backs both.
struct OpportunityMapper {
    provider_name: &'static str,
}

impl DataMapper for OpportunityMapper {
    fn validate(&self, opportunity: &Opportunity) -> bool {
        !opportunity.external_id.trim().is_empty()
            && !opportunity.title.trim().is_empty()
            && opportunity.provider_name == self.provider_name
    }

    fn opportunity_to_row(&self, opportunity: &Opportunity) -> OpportunityRow {
        let mut provider_specific_data = opportunity.provider_specific_data.clone();
        if !opportunity.items.is_empty() {
            let items_json = serde_json::to_value(&opportunity.items).unwrap_or(serde_json::Value::Null);
            match provider_specific_data {
                serde_json::Value::Object(ref mut map) => {
                    map.insert("__items".to_owned(), items_json);
                }
                _ => {
                    let mut map = serde_json::Map::new();
                    map.insert("__items".to_owned(), items_json);
                    provider_specific_data = serde_json::Value::Object(map);
                }
            }
        }

        OpportunityRow {
            provider_name: opportunity.provider_name.clone(),
            external_id: opportunity.external_id.clone(),
            title: opportunity.title.clone(),
            description: opportunity.description.clone(),
            estimated_value: opportunity.estimated_value,
            currency_code: opportunity.currency_code.clone(),
            country_code: opportunity.country_code.clone(),
            region_code: opportunity.region_code.clone(),
            municipality: opportunity.municipality.clone(),
            publication_date: opportunity.publication_date,
            submission_deadline: opportunity.submission_deadline,
            opening_date: opportunity.opening_date,
            procuring_entity_id: opportunity.procuring_entity_id.clone(),
            procuring_entity_name: opportunity.procuring_entity_name.clone(),
            provider_specific_data,
            created_at: opportunity.created_at,
            updated_at: opportunity.updated_at,
        }
    }

    fn row_to_opportunity(&self, row: &OpportunityRow) -> Result<Opportunity> {
        let mut provider_specific_data = row.provider_specific_data.clone();
        let items: Vec<OpportunityItem> = match &mut provider_specific_data {
            serde_json::Value::Object(map) => match map.remove("__items") {
                Some(value) => serde_json::from_value(value).unwrap_or_default(),
                None => Vec::new(),
            },
            _ => Vec::new(),
        };

        Ok(Opportunity {
            provider_name: row.provider_name.clone(),
            external_id: row.external_id.clone(),
            title: row.title.clone(),
            description: row.description.clone(),
            estimated_value: row.estimated_value,
            currency_code: row.currency_code.clone(),
            country_code: row.country_code.clone(),
            region_code: row.region_code.clone(),
            municipality: row.municipality.clone(),
            publication_date: row.publication_date,
            submission_deadline: row.submission_deadline,
            opening_date: row.opening_date,
            procuring_entity_id: row.procuring_entity_id.clone(),
            procuring_entity_name: row.procuring_entity_name.clone(),
            provider_specific_data,
            items,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    fn provider_name(&self) -> &str {
        self.provider_name
    }
}

fn rest_portal_mapper_factory(_config: &MapperConfig) -> std::result::Result<Arc<dyn DataMapper>, String> {
    Ok(Arc::new(OpportunityMapper { provider_name: "rest_portal" }))
}

fn scrape_portal_mapper_factory(_config: &MapperConfig) -> std::result::Result<Arc<dyn DataMapper>, String> {
    Ok(Arc::new(OpportunityMapper { provider_name: "scrape_portal" }))
}

#[linkme::distributed_slice(DATA_MAPPERS)]
static REST_PORTAL_MAPPER: MapperRegistryEntry = MapperRegistryEntry {
    name: "rest_portal",
    description: "maps Opportunity rows for the national REST portal",
    build: rest_portal_mapper_factory,
};

#[linkme::distributed_slice(DATA_MAPPERS)]
static SCRAPE_PORTAL_MAPPER: MapperRegistryEntry = MapperRegistryEntry {
    name: "scrape_portal",
    description: "maps Opportunity rows for the HTML-scraped portal",
    build: scrape_portal_mapper_factory,
};

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Opportunity {
        Opportunity {
            provider_name: "rest_portal".to_owned(),
            external_id: "00000000000191-8-000001/2026".to_owned(),
            title: "aquisição de papel".to_owned(),
            description: "compra de papel A4".to_owned(),
            estimated_value: None,
            currency_code: "BRL".to_owned(),
            country_code: "BR".to_owned(),
            region_code: Some("SP".to_owned()),
            municipality: None,
            publication_date: None,
            submission_deadline: None,
            opening_date: None,
            procuring_entity_id: None,
            procuring_entity_name: None,
            provider_specific_data: serde_json::json!({"extra": "value"}),
            items: vec![OpportunityItem {
                item_number: 1,
                description: "papel A4".to_owned(),
                quantity: None,
                unit: None,
                unit_estimated_value: None,
                material_or_service: licita_domain::value_objects::MaterialOrService::Material,
                ncm_code: None,
                me_epp_exclusive: false,
            }],
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn round_trips_items_through_provider_specific_data() {
        let mapper = OpportunityMapper { provider_name: "rest_portal" };
        let opportunity = sample();
        let row = mapper.opportunity_to_row(&opportunity);
        assert_eq!(row.provider_specific_data["extra"], "value");
        assert!(row.provider_specific_data["__items"].is_array());

        let restored = mapper.row_to_opportunity(&row).unwrap();
        assert_eq!(restored.items.len(), 1);
        assert_eq!(restored.items[0].description, "papel A4");
        assert_eq!(restored.provider_specific_data["extra"], "value");
        assert!(restored.provider_specific_data.get("__items").is_none());
    }

    #[test]
    fn validation_rejects_empty_required_fields() {
        let mapper = OpportunityMapper { provider_name: "rest_portal" };
        let mut opportunity = sample();
        assert!(mapper.validate(&opportunity));
        opportunity.external_id.clear();
        assert!(!mapper.validate(&opportunity));
    }
}
