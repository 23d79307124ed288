//! HTTP-backed paid embedding tier, OpenAI-compatible `/embeddings`
//! wire shape. Used for both the primary and secondary tiers in the
//! fallback chain (spec §4.5) by registering the same factory under
//! different [`EmbeddingTierConfig`] instances — `tier_name` is
//! carried in `config.extra["tier_name"]` since the two tiers share
//! one wire protocol but differ in endpoint/model/credentials.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use licita_domain::error::{Error, Result};
use licita_domain::registry::{EmbeddingTierConfig, EmbeddingTierRegistryEntry, EMBEDDING_TIERS};
use licita_domain::value_objects::Embedding;

use crate::http::{backoff_after_429, backoff_after_5xx, build_client, embedding_attempt_timeout};

const MAX_ATTEMPTS: u32 = 5;

pub struct HttpEmbeddingTier {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dimensions: usize,
    tier_name: String,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponseRow {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingResponseRow>,
}

impl HttpEmbeddingTier {
    #[must_use]
    pub fn new(base_url: String, api_key: String, model: String, dimensions: usize, tier_name: String) -> Self {
        Self {
            // Attempt timeouts are per-call, applied via `Client::timeout`
            // at request time below rather than at build time, since they
            // grow with the attempt number.
            client: build_client(Duration::from_secs(120)),
            base_url,
            api_key,
            model,
            dimensions,
            tier_name,
        }
    }

    async fn post_batch(&self, texts: &[String], attempt: u32) -> std::result::Result<Vec<EmbeddingResponseRow>, Error> {
        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(embedding_attempt_timeout(attempt))
            .json(&EmbeddingRequest { model: &self.model, input: texts })
            .send()
            .await
            .map_err(|e| Error::upstream_transient(&self.tier_name, e.to_string()))?;

        if response.status().as_u16() == 429 {
            return Err(Error::upstream_transient(&self.tier_name, "rate limited (429)"));
        }
        if response.status().is_server_error() {
            return Err(Error::upstream_transient(&self.tier_name, format!("HTTP {}", response.status())));
        }
        if !response.status().is_success() {
            return Err(Error::upstream_permanent(&self.tier_name, format!("HTTP {}", response.status())));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::upstream_permanent(&self.tier_name, format!("bad response shape: {e}")))?;
        Ok(body.data)
    }
}

#[async_trait]
impl licita_domain::ports::EmbeddingTier for HttpEmbeddingTier {
    /// Retries per spec §4.5: attempt timeouts grow 120s, 150s, 180s,
    /// 210s, 240s; a 429 backs off `2^(n+2)`s, a 5xx backs off `2^n`s; a
    /// 4xx other than 429 abandons the tier immediately (no point
    /// retrying a malformed request).
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut last_err = None;
        for attempt in 0..MAX_ATTEMPTS {
            match self.post_batch(texts, attempt).await {
                Ok(rows) => {
                    if rows.len() != texts.len() {
                        return Err(Error::embedding(format!(
                            "{} returned {} embeddings for {} inputs",
                            self.tier_name,
                            rows.len(),
                            texts.len()
                        )));
                    }
                    let mut ordered: Vec<Option<Vec<f32>>> = vec![None; rows.len()];
                    for row in rows {
                        if row.index < ordered.len() {
                            ordered[row.index] = Some(row.embedding);
                        }
                    }
                    return ordered
                        .into_iter()
                        .map(|v| {
                            v.map(|values| Embedding::new(values, self.model.clone()))
                                .ok_or_else(|| Error::embedding(format!("{} response missing an index", self.tier_name)))
                        })
                        .collect();
                }
                Err(err @ Error::Upstream { transient: false, .. }) => return Err(err),
                Err(err) => {
                    tracing::warn!(tier = %self.tier_name, attempt, error = %err, "embedding attempt failed");
                    let is_429 = matches!(&err, Error::Upstream { message, .. } if message.contains("429"));
                    let backoff = if is_429 { backoff_after_429(attempt) } else { backoff_after_5xx(attempt) };
                    last_err = Some(err);
                    if attempt + 1 < MAX_ATTEMPTS {
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }
        Err(last_err.unwrap_or_else(|| Error::embedding(format!("{} exhausted retries", self.tier_name))))
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn tier_name(&self) -> &str {
        &self.tier_name
    }
}

fn http_tier_factory(config: &EmbeddingTierConfig) -> std::result::Result<Arc<dyn licita_domain::ports::EmbeddingTier>, String> {
    let base_url = config
        .base_url
        .clone()
        .ok_or_else(|| "http_embedding tier requires base_url".to_owned())?;
    let api_key = config.api_key.clone().unwrap_or_default();
    let model = config.model.clone().ok_or_else(|| "http_embedding tier requires model".to_owned())?;
    let dimensions = config.dimensions.unwrap_or(1536);
    let tier_name = config.extra.get("tier_name").cloned().unwrap_or_else(|| "primary".to_owned());
    Ok(Arc::new(HttpEmbeddingTier::new(base_url, api_key, model, dimensions, tier_name)))
}

#[linkme::distributed_slice(EMBEDDING_TIERS)]
static HTTP_EMBEDDING_TIER: EmbeddingTierRegistryEntry = EmbeddingTierRegistryEntry {
    name: "http_embedding",
    description: "OpenAI-compatible HTTP embedding endpoint (paid tiers)",
    build: http_tier_factory,
};
