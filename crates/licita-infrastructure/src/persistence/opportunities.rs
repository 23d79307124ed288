use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use licita_domain::entities::{Company, Match, Opportunity, OpportunityItem};
use licita_domain::error::{Error, Result};
use licita_domain::ports::mapper::{DataMapper, OpportunityRow};
use licita_domain::ports::persistence::{BatchSaveResult, PersistenceFilters, PersistenceService, PersistenceStats, ProviderStat};
use licita_domain::registry::{resolve_data_mapper, MapperConfig};
use licita_domain::value_objects::{CompanyId, MaterialOrService, OpportunityId};

use super::opportunity_row_id;

/// sqlx/Postgres [`PersistenceService`], dispatching `Opportunity` <->
/// `OpportunityRow` conversion through the [`DATA_MAPPERS`] registry
/// keyed by `provider_name`, per spec C2/C3.
///
/// [`DATA_MAPPERS`]: licita_domain::registry::DATA_MAPPERS
pub struct PgPersistenceService {
    pool: PgPool,
    mappers: HashMap<String, Arc<dyn DataMapper>>,
}

impl PgPersistenceService {
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if any of `provider_names` is not
    /// registered in the Data Mapper registry.
    pub fn new(pool: PgPool, provider_names: &[&str]) -> Result<Self> {
        let mut mappers = HashMap::new();
        for name in provider_names {
            let config = MapperConfig { provider: (*name).to_owned(), extra: HashMap::new() };
            let mapper = resolve_data_mapper(name, &config)?;
            mappers.insert((*name).to_owned(), mapper);
        }
        Ok(Self { pool, mappers })
    }

    fn mapper_for(&self, provider_name: &str) -> Result<&Arc<dyn DataMapper>> {
        self.mappers.get(provider_name).ok_or_else(|| Error::config(format!("no data mapper registered for provider '{provider_name}'")))
    }

    async fn save_row(&self, row: &OpportunityRow) -> Result<bool> {
        let id = opportunity_row_id(&row.provider_name, &row.external_id);
        // `opportunity_to_row` embeds items under `provider_specific_data
        // ["__items"]` as a mapper-level round-trip convenience (useful
        // for the in-memory fixtures in `licita-application`'s tests);
        // here items live in the dedicated `opportunity_items` table
        // instead, so strip the duplicate before persisting the blob.
        let mut provider_specific_data = row.provider_specific_data.clone();
        if let serde_json::Value::Object(map) = &mut provider_specific_data {
            map.remove("__items");
        }
        let result = sqlx::query(
            "INSERT INTO opportunities \
             (id, provider_name, external_id, title, description, estimated_value, currency_code, \
              country_code, region_code, municipality, publication_date, submission_deadline, \
              opening_date, procuring_entity_id, procuring_entity_name, provider_specific_data, \
              created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, now(), now()) \
             ON CONFLICT (provider_name, external_id) DO UPDATE SET \
             title = excluded.title, description = excluded.description, \
             estimated_value = excluded.estimated_value, currency_code = excluded.currency_code, \
             country_code = excluded.country_code, region_code = excluded.region_code, \
             municipality = excluded.municipality, publication_date = excluded.publication_date, \
             submission_deadline = excluded.submission_deadline, opening_date = excluded.opening_date, \
             procuring_entity_id = excluded.procuring_entity_id, \
             procuring_entity_name = excluded.procuring_entity_name, \
             provider_specific_data = excluded.provider_specific_data, \
             updated_at = now()",
        )
        .bind(&id)
        .bind(&row.provider_name)
        .bind(&row.external_id)
        .bind(&row.title)
        .bind(&row.description)
        .bind(row.estimated_value)
        .bind(&row.currency_code)
        .bind(&row.country_code)
        .bind(&row.region_code)
        .bind(&row.municipality)
        .bind(row.publication_date)
        .bind(row.submission_deadline)
        .bind(row.opening_date)
        .bind(&row.procuring_entity_id)
        .bind(&row.procuring_entity_name)
        .bind(&provider_specific_data)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn fetch_row(&self, sql: &str, bind: &str) -> Result<Option<OpportunityRow>> {
        let row = sqlx::query(sql).bind(bind).fetch_optional(&self.pool).await.map_err(|e| Error::database(e.to_string()))?;
        row.map(row_to_opportunity_row).transpose()
    }
}

fn row_to_opportunity_row(row: sqlx::postgres::PgRow) -> Result<OpportunityRow> {
    Ok(OpportunityRow {
        provider_name: row.try_get("provider_name").map_err(|e| Error::database(e.to_string()))?,
        external_id: row.try_get("external_id").map_err(|e| Error::database(e.to_string()))?,
        title: row.try_get("title").map_err(|e| Error::database(e.to_string()))?,
        description: row.try_get("description").map_err(|e| Error::database(e.to_string()))?,
        estimated_value: row.try_get("estimated_value").map_err(|e| Error::database(e.to_string()))?,
        currency_code: row.try_get("currency_code").map_err(|e| Error::database(e.to_string()))?,
        country_code: row.try_get("country_code").map_err(|e| Error::database(e.to_string()))?,
        region_code: row.try_get("region_code").map_err(|e| Error::database(e.to_string()))?,
        municipality: row.try_get("municipality").map_err(|e| Error::database(e.to_string()))?,
        publication_date: row.try_get("publication_date").map_err(|e| Error::database(e.to_string()))?,
        submission_deadline: row.try_get("submission_deadline").map_err(|e| Error::database(e.to_string()))?,
        opening_date: row.try_get("opening_date").map_err(|e| Error::database(e.to_string()))?,
        procuring_entity_id: row.try_get("procuring_entity_id").map_err(|e| Error::database(e.to_string()))?,
        procuring_entity_name: row.try_get("procuring_entity_name").map_err(|e| Error::database(e.to_string()))?,
        provider_specific_data: row.try_get("provider_specific_data").map_err(|e| Error::database(e.to_string()))?,
        created_at: row.try_get("created_at").map_err(|e| Error::database(e.to_string()))?,
        updated_at: row.try_get("updated_at").map_err(|e| Error::database(e.to_string()))?,
    })
}

fn material_or_service_str(value: MaterialOrService) -> &'static str {
    match value {
        MaterialOrService::Material => "material",
        MaterialOrService::Service => "service",
    }
}

fn parse_material_or_service(value: &str) -> MaterialOrService {
    match value {
        "service" => MaterialOrService::Service,
        _ => MaterialOrService::Material,
    }
}

#[async_trait]
impl PersistenceService for PgPersistenceService {
    async fn save(&self, opportunity: &Opportunity) -> Result<bool> {
        let mapper = self.mapper_for(&opportunity.provider_name)?;
        if !mapper.validate(opportunity) {
            return Err(Error::Validation { message: format!("opportunity {}:{} failed mapper validation", opportunity.provider_name, opportunity.external_id) });
        }
        let row = mapper.opportunity_to_row(opportunity);
        self.save_row(&row).await?;
        if !opportunity.items.is_empty() {
            let id = OpportunityId::from_string(opportunity_row_id(&opportunity.provider_name, &opportunity.external_id));
            self.save_items(&id, &opportunity.items).await?;
        }
        Ok(true)
    }

    async fn save_batch(&self, opportunities: &[Opportunity]) -> Result<BatchSaveResult> {
        let mut result = BatchSaveResult::default();
        let mut by_provider: HashMap<&str, Vec<&Opportunity>> = HashMap::new();
        for opportunity in opportunities {
            if opportunity.provider_name.trim().is_empty() {
                result.skipped += 1;
                continue;
            }
            by_provider.entry(opportunity.provider_name.as_str()).or_default().push(opportunity);
        }

        for (provider_name, batch) in by_provider {
            let Ok(mapper) = self.mapper_for(provider_name) else {
                result.failed += batch.len();
                continue;
            };
            for opportunity in batch {
                if !mapper.validate(opportunity) {
                    result.failed += 1;
                    continue;
                }
                let row = mapper.opportunity_to_row(opportunity);
                match self.save_row(&row).await {
                    Ok(_) => {
                        result.success += 1;
                        if !opportunity.items.is_empty() {
                            let id = OpportunityId::from_string(opportunity_row_id(&opportunity.provider_name, &opportunity.external_id));
                            let _ = self.save_items(&id, &opportunity.items).await;
                        }
                    }
                    Err(_) => result.failed += 1,
                }
            }
        }

        Ok(result)
    }

    async fn get(&self, provider_name: &str, external_id: &str) -> Result<Option<Opportunity>> {
        self.get_by_provider_and_external_id(provider_name, external_id).await
    }

    async fn get_by_id(&self, opportunity_id: &OpportunityId) -> Result<Option<Opportunity>> {
        let row = self.fetch_row("SELECT * FROM opportunities WHERE id = $1", opportunity_id.as_str()).await?;
        match row {
            Some(row) => self.row_to_opportunity_with_items(row).await,
            None => Ok(None),
        }
    }

    async fn save_items(&self, opportunity_id: &OpportunityId, items: &[OpportunityItem]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(|e| Error::database(e.to_string()))?;
        sqlx::query("DELETE FROM opportunity_items WHERE opportunity_id = $1")
            .bind(opportunity_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::database(e.to_string()))?;

        for item in items {
            sqlx::query(
                "INSERT INTO opportunity_items \
                 (opportunity_id, item_number, description, quantity, unit, unit_estimated_value, \
                  material_or_service, ncm_code, me_epp_exclusive) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(opportunity_id.as_str())
            .bind(item.item_number)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(&item.unit)
            .bind(item.unit_estimated_value)
            .bind(material_or_service_str(item.material_or_service))
            .bind(&item.ncm_code)
            .bind(item.me_epp_exclusive)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::database(e.to_string()))?;
        }

        tx.commit().await.map_err(|e| Error::database(e.to_string()))?;
        Ok(())
    }

    async fn search(&self, provider_name: Option<&str>, filters: &PersistenceFilters, limit: usize, offset: usize) -> Result<Vec<Opportunity>> {
        let mut sql = String::from("SELECT * FROM opportunities WHERE 1 = 1");
        let mut binds: Vec<String> = Vec::new();

        if let Some(provider) = provider_name {
            binds.push(provider.to_owned());
            sql += &format!(" AND provider_name = ${}", binds.len());
        }
        if let Some(region) = &filters.region_code {
            binds.push(region.clone());
            sql += &format!(" AND region_code = ${}", binds.len());
        }
        if let Some(category) = &filters.category {
            binds.push(format!("%{category}%"));
            sql += &format!(" AND provider_specific_data::text ILIKE ${}", binds.len());
        }
        match filters.status.as_deref() {
            Some("open") => sql += " AND submission_deadline IS NOT NULL AND submission_deadline - interval '1 day' > now()",
            Some("closed") => sql += " AND submission_deadline IS NOT NULL AND submission_deadline - interval '1 day' <= now()",
            Some("undefined") => sql += " AND submission_deadline IS NULL",
            _ => {}
        }
        if let Some(from) = filters.date_from {
            binds.push(from.to_string());
            sql += &format!(" AND publication_date >= ${}::timestamp", binds.len());
        }
        if let Some(to) = filters.date_to {
            binds.push(to.to_string());
            sql += &format!(" AND publication_date <= ${}::timestamp", binds.len());
        }

        sql += " ORDER BY created_at DESC";
        binds.push(limit.to_string());
        sql += &format!(" LIMIT ${}", binds.len());
        binds.push(offset.to_string());
        sql += &format!(" OFFSET ${}", binds.len());

        let mut query = sqlx::query(&sql);
        for (i, bind) in binds.iter().enumerate() {
            // the two final binds (limit/offset) are numeric and bound
            // separately below; string binds up to that point are plain
            // filter values.
            if i >= binds.len() - 2 {
                continue;
            }
            query = query.bind(bind);
        }
        query = query.bind(limit as i64).bind(offset as i64);

        let rows = query.fetch_all(&self.pool).await.map_err(|e| Error::database(e.to_string()))?;
        let mut opportunities = Vec::with_capacity(rows.len());
        for row in rows {
            let opportunity_row = row_to_opportunity_row(row)?;
            if let Some(opportunity) = self.row_to_opportunity_with_items(opportunity_row).await? {
                opportunities.push(opportunity);
            }
        }
        Ok(opportunities)
    }

    async fn stats(&self) -> Result<PersistenceStats> {
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM opportunities").fetch_one(&self.pool).await.map_err(|e| Error::database(e.to_string()))?;
        let by_provider_rows: Vec<(String, i64)> = sqlx::query_as("SELECT provider_name, COUNT(*) FROM opportunities GROUP BY provider_name")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::database(e.to_string()))?;
        Ok(PersistenceStats {
            total: total.0,
            by_provider: by_provider_rows.into_iter().map(|(provider_name, count)| ProviderStat { provider_name, count }).collect(),
        })
    }

    async fn get_company(&self, id: &CompanyId) -> Result<Option<Company>> {
        let row = sqlx::query("SELECT * FROM companies WHERE id = $1").bind(id.as_str()).fetch_optional(&self.pool).await.map_err(|e| Error::database(e.to_string()))?;
        row.map(row_to_company).transpose()
    }

    async fn list_companies(&self) -> Result<Vec<Company>> {
        let rows = sqlx::query("SELECT * FROM companies").fetch_all(&self.pool).await.map_err(|e| Error::database(e.to_string()))?;
        rows.into_iter().map(row_to_company).collect()
    }

    async fn upsert_match(&self, m: &Match) -> Result<()> {
        sqlx::query(
            "INSERT INTO matches (company_id, opportunity_id, similarity_score, llm_approved, llm_reasoning, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (company_id, opportunity_id) DO UPDATE SET \
             similarity_score = excluded.similarity_score, llm_approved = excluded.llm_approved, \
             llm_reasoning = excluded.llm_reasoning, created_at = excluded.created_at",
        )
        .bind(m.company_id.as_str())
        .bind(m.opportunity_id.as_str())
        .bind(m.similarity_score)
        .bind(m.llm_approved)
        .bind(&m.llm_reasoning)
        .bind(m.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::database(e.to_string()))?;
        Ok(())
    }

    async fn clear_matches_for_opportunities(&self, opportunity_ids: &[OpportunityId]) -> Result<u64> {
        if opportunity_ids.is_empty() {
            return Ok(0);
        }
        let ids: Vec<String> = opportunity_ids.iter().map(|id| id.as_str().to_owned()).collect();
        let result = sqlx::query("DELETE FROM matches WHERE opportunity_id = ANY($1)").bind(&ids).execute(&self.pool).await.map_err(|e| Error::database(e.to_string()))?;
        Ok(result.rows_affected())
    }

    async fn has_match(&self, company_id: &CompanyId, opportunity_id: &OpportunityId) -> Result<bool> {
        let row: Option<(i32,)> = sqlx::query_as("SELECT 1 FROM matches WHERE company_id = $1 AND opportunity_id = $2")
            .bind(company_id.as_str())
            .bind(opportunity_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::database(e.to_string()))?;
        Ok(row.is_some())
    }

    async fn recent_opportunities(&self, since_days: i64) -> Result<Vec<Opportunity>> {
        let rows = sqlx::query("SELECT * FROM opportunities WHERE updated_at >= now() - make_interval(days => $1) ORDER BY updated_at DESC")
            .bind(since_days as i32)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::database(e.to_string()))?;
        let mut opportunities = Vec::with_capacity(rows.len());
        for row in rows {
            let opportunity_row = row_to_opportunity_row(row)?;
            if let Some(opportunity) = self.row_to_opportunity_with_items(opportunity_row).await? {
                opportunities.push(opportunity);
            }
        }
        Ok(opportunities)
    }
}

impl PgPersistenceService {
    async fn get_by_provider_and_external_id(&self, provider_name: &str, external_id: &str) -> Result<Option<Opportunity>> {
        let row = sqlx::query("SELECT * FROM opportunities WHERE provider_name = $1 AND external_id = $2")
            .bind(provider_name)
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::database(e.to_string()))?;
        let Some(row) = row else { return Ok(None) };
        let opportunity_row = row_to_opportunity_row(row)?;
        self.row_to_opportunity_with_items(opportunity_row).await
    }

    async fn row_to_opportunity_with_items(&self, row: OpportunityRow) -> Result<Option<Opportunity>> {
        let Ok(mapper) = self.mapper_for(&row.provider_name) else { return Ok(None) };
        let mut opportunity = mapper.row_to_opportunity(&row)?;
        let id = opportunity_row_id(&opportunity.provider_name, &opportunity.external_id);
        opportunity.items = self.load_items(&id).await?;
        Ok(Some(opportunity))
    }

    async fn load_items(&self, opportunity_id: &str) -> Result<Vec<OpportunityItem>> {
        let rows = sqlx::query(
            "SELECT item_number, description, quantity, unit, unit_estimated_value, \
             material_or_service, ncm_code, me_epp_exclusive \
             FROM opportunity_items WHERE opportunity_id = $1 ORDER BY item_number",
        )
        .bind(opportunity_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::database(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                let material_or_service: String = row.try_get("material_or_service").map_err(|e| Error::database(e.to_string()))?;
                Ok(OpportunityItem {
                    item_number: row.try_get("item_number").map_err(|e| Error::database(e.to_string()))?,
                    description: row.try_get("description").map_err(|e| Error::database(e.to_string()))?,
                    quantity: row.try_get("quantity").map_err(|e| Error::database(e.to_string()))?,
                    unit: row.try_get("unit").map_err(|e| Error::database(e.to_string()))?,
                    unit_estimated_value: row.try_get("unit_estimated_value").map_err(|e| Error::database(e.to_string()))?,
                    material_or_service: parse_material_or_service(&material_or_service),
                    ncm_code: row.try_get("ncm_code").map_err(|e| Error::database(e.to_string()))?,
                    me_epp_exclusive: row.try_get("me_epp_exclusive").map_err(|e| Error::database(e.to_string()))?,
                })
            })
            .collect()
    }
}

fn row_to_company(row: sqlx::postgres::PgRow) -> Result<Company> {
    let products: serde_json::Value = row.try_get("products").map_err(|e| Error::database(e.to_string()))?;
    let keywords: serde_json::Value = row.try_get("keywords").map_err(|e| Error::database(e.to_string()))?;
    Ok(Company {
        id: CompanyId::from_string(row.try_get::<String, _>("id").map_err(|e| Error::database(e.to_string()))?),
        legal_name: row.try_get("legal_name").map_err(|e| Error::database(e.to_string()))?,
        trade_name: row.try_get("trade_name").map_err(|e| Error::database(e.to_string()))?,
        tax_id: row.try_get("tax_id").map_err(|e| Error::database(e.to_string()))?,
        description: row.try_get("description").map_err(|e| Error::database(e.to_string()))?,
        products: serde_json::from_value(products).unwrap_or_default(),
        keywords: serde_json::from_value(keywords).unwrap_or_default(),
        owner_user_id: row.try_get("owner_user_id").map_err(|e| Error::database(e.to_string()))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn material_or_service_round_trips() {
        assert_eq!(parse_material_or_service(material_or_service_str(MaterialOrService::Service)), MaterialOrService::Service);
        assert_eq!(parse_material_or_service(material_or_service_str(MaterialOrService::Material)), MaterialOrService::Material);
    }
}
