use async_trait::async_trait;
use sqlx::{PgPool, Row};

use licita_domain::entities::Document;
use licita_domain::error::{Error, Result};
use licita_domain::ports::documents::DocumentRepository;
use licita_domain::value_objects::{DocumentId, ExtractionStatus, OpportunityId};

/// sqlx/Postgres [`DocumentRepository`] (spec C8 dependency), grounded on
/// the same query/error-wrapping conventions as
/// [`super::opportunities::PgPersistenceService`].
pub struct PgDocumentRepository {
    pool: PgPool,
}

impl PgDocumentRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn extraction_status_str(status: ExtractionStatus) -> &'static str {
    match status {
        ExtractionStatus::Pending => "pending",
        ExtractionStatus::Processing => "processing",
        ExtractionStatus::Done => "done",
        ExtractionStatus::Failed => "failed",
    }
}

fn parse_extraction_status(value: &str) -> ExtractionStatus {
    match value {
        "processing" => ExtractionStatus::Processing,
        "done" => ExtractionStatus::Done,
        "failed" => ExtractionStatus::Failed,
        _ => ExtractionStatus::Pending,
    }
}

fn row_to_document(row: sqlx::postgres::PgRow) -> Result<Document> {
    let extraction_status: String = row.try_get("extraction_status").map_err(|e| Error::database(e.to_string()))?;
    Ok(Document {
        id: DocumentId::from_string(row.try_get::<String, _>("id").map_err(|e| Error::database(e.to_string()))?),
        opportunity_id: OpportunityId::from_string(row.try_get::<String, _>("opportunity_id").map_err(|e| Error::database(e.to_string()))?),
        title: row.try_get("title").map_err(|e| Error::database(e.to_string()))?,
        storage_url: row.try_get("storage_url").map_err(|e| Error::database(e.to_string()))?,
        size_bytes: row.try_get::<i64, _>("size_bytes").map_err(|e| Error::database(e.to_string()))? as u64,
        content_hash: row.try_get("content_hash").map_err(|e| Error::database(e.to_string()))?,
        mime_type: row.try_get("mime_type").map_err(|e| Error::database(e.to_string()))?,
        extraction_status: parse_extraction_status(&extraction_status),
        extracted_text: row.try_get("extracted_text").map_err(|e| Error::database(e.to_string()))?,
        extraction_engine: row.try_get("extraction_engine").map_err(|e| Error::database(e.to_string()))?,
    })
}

#[async_trait]
impl DocumentRepository for PgDocumentRepository {
    async fn save(&self, document: &Document) -> Result<()> {
        sqlx::query(
            "INSERT INTO documents \
             (id, opportunity_id, title, storage_url, size_bytes, content_hash, mime_type, \
              extraction_status, extracted_text, extraction_engine) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (id) DO UPDATE SET \
             title = excluded.title, storage_url = excluded.storage_url, \
             size_bytes = excluded.size_bytes, content_hash = excluded.content_hash, \
             mime_type = excluded.mime_type, extraction_status = excluded.extraction_status, \
             extracted_text = excluded.extracted_text, extraction_engine = excluded.extraction_engine",
        )
        .bind(document.id.as_str())
        .bind(document.opportunity_id.as_str())
        .bind(&document.title)
        .bind(&document.storage_url)
        .bind(document.size_bytes as i64)
        .bind(&document.content_hash)
        .bind(&document.mime_type)
        .bind(extraction_status_str(document.extraction_status))
        .bind(&document.extracted_text)
        .bind(&document.extraction_engine)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::database(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, id: &DocumentId) -> Result<Option<Document>> {
        let row = sqlx::query("SELECT * FROM documents WHERE id = $1").bind(id.as_str()).fetch_optional(&self.pool).await.map_err(|e| Error::database(e.to_string()))?;
        row.map(row_to_document).transpose()
    }

    async fn list_for_opportunity(&self, opportunity_id: &OpportunityId) -> Result<Vec<Document>> {
        let rows = sqlx::query("SELECT * FROM documents WHERE opportunity_id = $1")
            .bind(opportunity_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::database(e.to_string()))?;
        rows.into_iter().map(row_to_document).collect()
    }

    async fn update_extraction(&self, id: &DocumentId, status: ExtractionStatus, extracted_text: Option<&str>, extraction_engine: Option<&str>) -> Result<()> {
        sqlx::query("UPDATE documents SET extraction_status = $2, extracted_text = $3, extraction_engine = $4 WHERE id = $1")
            .bind(id.as_str())
            .bind(extraction_status_str(status))
            .bind(extracted_text)
            .bind(extraction_engine)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::database(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_status_round_trips() {
        for status in [ExtractionStatus::Pending, ExtractionStatus::Processing, ExtractionStatus::Done, ExtractionStatus::Failed] {
            assert_eq!(parse_extraction_status(extraction_status_str(status)), status);
        }
    }
}
