//! Relational persistence (spec §4.3, §6): sqlx/Postgres implementations
//! of [`PersistenceService`](licita_domain::ports::PersistenceService) and
//! [`DocumentRepository`](licita_domain::ports::DocumentRepository),
//! grounded on the query/`query_as`/error-wrapping conventions already
//! established in `licita_providers::dedup` and
//! `licita_providers::vector_store::pgvector`.

mod documents;
mod opportunities;

pub use documents::PgDocumentRepository;
pub use opportunities::PgPersistenceService;

/// Surrogate id the application layer knows as `OpportunityId` (spec §6):
/// `"{provider_name}:{external_id}"`, computed the same way
/// `licita_application::use_cases::matching_engine::opportunity_id` does
/// so `get_by_id` never needs to parse it back apart.
pub(crate) fn opportunity_row_id(provider_name: &str, external_id: &str) -> String {
    format!("{provider_name}:{external_id}")
}

#[cfg(test)]
mod id_tests {
    use super::opportunity_row_id;

    #[test]
    fn matches_provider_colon_external_id_format() {
        assert_eq!(opportunity_row_id("rest_portal", "123"), "rest_portal:123");
    }
}
