//! Dedup Service (spec C14 / §4.14), backed by the `rag_document_processed`
//! table: one row per document that has ever been vectorized, keyed by
//! `document_id` and carrying the content hash it was processed under.

use async_trait::async_trait;
use sqlx::PgPool;

use licita_domain::error::{Error, Result};
use licita_domain::ports::dedup::{DedupProvider, DocumentFingerprint};
use licita_domain::value_objects::DocumentId;

pub struct SqlDedupProvider {
    pool: PgPool,
}

impl SqlDedupProvider {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DedupProvider for SqlDedupProvider {
    async fn should_process(&self, document_id: &DocumentId, fingerprint: &DocumentFingerprint) -> Result<bool> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT content_hash FROM rag_document_processed WHERE document_id = $1",
        )
        .bind(document_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::database(e.to_string()))?;

        Ok(match row {
            Some((stored_hash,)) => stored_hash != fingerprint.content_hash,
            None => true,
        })
    }

    async fn mark_processed(&self, document_id: &DocumentId, fingerprint: &DocumentFingerprint) -> Result<()> {
        sqlx::query(
            "INSERT INTO rag_document_processed (document_id, content_hash, size_bytes, storage_url, processed_at) \
             VALUES ($1, $2, $3, $4, now()) \
             ON CONFLICT (document_id) DO UPDATE SET \
             content_hash = excluded.content_hash, \
             size_bytes = excluded.size_bytes, \
             storage_url = excluded.storage_url, \
             processed_at = excluded.processed_at",
        )
        .bind(document_id.as_str())
        .bind(&fingerprint.content_hash)
        .bind(fingerprint.size_bytes as i64)
        .bind(&fingerprint.url)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::database(e.to_string()))?;

        Ok(())
    }
}
