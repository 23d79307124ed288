//! Postgres + `pgvector` backed vector store (spec C10 / §4.10), the
//! production backend. Embedding vectors are bound as `vector` literal
//! strings (`[0.1,0.2,...]`) and cast in SQL, avoiding a dependency on a
//! dedicated pgvector crate for what is otherwise plain `sqlx`.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use licita_domain::entities::Chunk;
use licita_domain::error::{Error, Result};
use licita_domain::ports::vector_store::{DocumentVectorizationStatus, VectorStoreProvider, VectorizationStatus};
use licita_domain::value_objects::{ChunkId, ChunkType, DocumentId, Embedding, OpportunityId};

pub struct PgVectorStore {
    pool: PgPool,
}

impl PgVectorStore {
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `dsn` is malformed or the pool
    /// cannot be established.
    pub async fn connect(dsn: &str) -> Result<Self> {
        let pool = PgPool::connect(dsn).await.map_err(|e| Error::config(format!("postgres connect failed: {e}")))?;
        Ok(Self { pool })
    }
}

fn embedding_literal(embedding: &Embedding) -> String {
    let parts: Vec<String> = embedding.values.iter().map(|v| v.to_string()).collect();
    format!("[{}]", parts.join(","))
}

fn parse_chunk_type(value: &str) -> ChunkType {
    match value {
        "title" => ChunkType::Title,
        "subtitle" => ChunkType::Subtitle,
        "list" => ChunkType::List,
        "table" => ChunkType::Table,
        _ => ChunkType::Paragraph,
    }
}

#[async_trait]
impl VectorStoreProvider for PgVectorStore {
    async fn save_chunks(&self, document_id: &DocumentId, opportunity_id: &OpportunityId, chunks: &[Chunk]) -> Result<()> {
        if chunks.iter().any(|c| c.embedding.is_none()) {
            return Err(Error::vector_store("every chunk must carry an embedding before save_chunks"));
        }

        let mut tx = self.pool.begin().await.map_err(|e| Error::database(e.to_string()))?;

        sqlx::query("DELETE FROM rag_chunks WHERE document_id = $1")
            .bind(document_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::database(e.to_string()))?;

        for chunk in chunks {
            let embedding = chunk.embedding.as_ref().expect("checked above");
            let metadata = serde_json::to_value(&chunk.metadata).unwrap_or(serde_json::Value::Null);
            sqlx::query(
                "INSERT INTO rag_chunks \
                 (id, document_id, opportunity_id, text, chunk_type, page_number, section_title, \
                  token_count, char_count, embedding, embedding_model, metadata) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10::vector, $11, $12)",
            )
            .bind(chunk.id.as_str())
            .bind(document_id.as_str())
            .bind(opportunity_id.as_str())
            .bind(&chunk.text)
            .bind(format!("{:?}", chunk.chunk_type).to_lowercase())
            .bind(chunk.page_number.map(|p| p as i32))
            .bind(&chunk.section_title)
            .bind(chunk.token_count as i32)
            .bind(chunk.char_count as i32)
            .bind(embedding_literal(embedding))
            .bind(&embedding.model_name)
            .bind(metadata)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::database(e.to_string()))?;
        }

        tx.commit().await.map_err(|e| Error::database(e.to_string()))?;
        Ok(())
    }

    async fn count_chunks(&self, document_id: &DocumentId) -> Result<usize> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM rag_chunks WHERE document_id = $1")
            .bind(document_id.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::database(e.to_string()))?;
        Ok(row.0 as usize)
    }

    async fn delete_chunks_for_document(&self, document_id: &DocumentId) -> Result<()> {
        sqlx::query("DELETE FROM rag_chunks WHERE document_id = $1")
            .bind(document_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| Error::database(e.to_string()))?;
        Ok(())
    }

    async fn vectorization_status(&self, _opportunity_id: &OpportunityId, document_ids: &[DocumentId]) -> Result<VectorizationStatus> {
        let mut per_document = Vec::with_capacity(document_ids.len());
        for document_id in document_ids {
            let chunk_count = self.count_chunks(document_id).await?;
            per_document.push(DocumentVectorizationStatus { document_id: document_id.clone(), chunk_count, fully_vectorized: chunk_count > 0 });
        }
        let fully_vectorized = per_document.iter().all(|d| d.fully_vectorized);
        Ok(VectorizationStatus { fully_vectorized, per_document })
    }

    async fn vector_search(&self, opportunity_id: &OpportunityId, query_embedding: &[f32], limit: usize) -> Result<Vec<(Chunk, f32)>> {
        let literal = embedding_literal(&Embedding::new(query_embedding.to_vec(), String::new()));
        let rows = sqlx::query(
            "SELECT id, document_id, opportunity_id, text, chunk_type, page_number, section_title, \
             token_count, char_count, embedding_model, metadata, \
             1 - (embedding <=> $2::vector) AS score \
             FROM rag_chunks WHERE opportunity_id = $1 \
             ORDER BY embedding <=> $2::vector ASC LIMIT $3",
        )
        .bind(opportunity_id.as_str())
        .bind(literal)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::database(e.to_string()))?;

        rows.into_iter().map(row_to_scored_chunk).collect()
    }

    async fn keyword_search(&self, opportunity_id: &OpportunityId, normalized_query_terms: &[String], limit: usize) -> Result<Vec<(Chunk, f32)>> {
        if normalized_query_terms.is_empty() {
            return Ok(Vec::new());
        }
        let pattern = normalized_query_terms.join(" | ");
        let rows = sqlx::query(
            "SELECT id, document_id, opportunity_id, text, chunk_type, page_number, section_title, \
             token_count, char_count, embedding_model, metadata, \
             ts_rank(to_tsvector('portuguese', text), to_tsquery('portuguese', $2)) AS score \
             FROM rag_chunks WHERE opportunity_id = $1 \
             AND to_tsvector('portuguese', text) @@ to_tsquery('portuguese', $2) \
             ORDER BY score DESC LIMIT $3",
        )
        .bind(opportunity_id.as_str())
        .bind(pattern)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::database(e.to_string()))?;

        rows.into_iter().map(row_to_scored_chunk).collect()
    }
}

fn row_to_scored_chunk(row: sqlx::postgres::PgRow) -> Result<(Chunk, f32)> {
    let metadata: serde_json::Value = row.try_get("metadata").map_err(|e| Error::database(e.to_string()))?;
    let metadata_map: std::collections::HashMap<String, serde_json::Value> = match metadata {
        serde_json::Value::Object(map) => map.into_iter().collect(),
        _ => std::collections::HashMap::new(),
    };
    let chunk_type_str: String = row.try_get("chunk_type").map_err(|e| Error::database(e.to_string()))?;
    let page_number: Option<i32> = row.try_get("page_number").map_err(|e| Error::database(e.to_string()))?;
    let token_count: i32 = row.try_get("token_count").map_err(|e| Error::database(e.to_string()))?;
    let char_count: i32 = row.try_get("char_count").map_err(|e| Error::database(e.to_string()))?;
    let score: f64 = row.try_get("score").map_err(|e| Error::database(e.to_string()))?;

    let chunk = Chunk {
        id: ChunkId::from_string(row.try_get::<String, _>("id").map_err(|e| Error::database(e.to_string()))?),
        document_id: DocumentId::from_string(row.try_get::<String, _>("document_id").map_err(|e| Error::database(e.to_string()))?),
        opportunity_id: OpportunityId::from_string(row.try_get::<String, _>("opportunity_id").map_err(|e| Error::database(e.to_string()))?),
        text: row.try_get("text").map_err(|e| Error::database(e.to_string()))?,
        chunk_type: parse_chunk_type(&chunk_type_str),
        page_number: page_number.map(|p| p as u32),
        section_title: row.try_get("section_title").map_err(|e| Error::database(e.to_string()))?,
        token_count: token_count as usize,
        char_count: char_count as usize,
        embedding: None,
        metadata: metadata_map,
    };
    Ok((chunk, score as f32))
}

// Not registered in VECTOR_STORES: the registry's `build` is synchronous,
// but establishing a Postgres pool is not. The composition root
// constructs this provider directly with `PgVectorStore::connect` when
// configuration names `"pgvector"`, the same way it handles the cache
// providers (see `crate::cache`).
