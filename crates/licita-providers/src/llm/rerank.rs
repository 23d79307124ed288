//! Reranker for the Retrieval & Answer Engine (spec C11 / §4.11 step 4).

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use licita_domain::constants::DEFAULT_LLM_TEMPERATURE_MIN;
use licita_domain::entities::Chunk;
use licita_domain::error::{Error, Result};
use licita_domain::ports::{ChatCompletionProvider, RerankProvider, RerankedChunk};

pub struct LlmRerankProvider {
    chat: Arc<dyn ChatCompletionProvider>,
}

impl LlmRerankProvider {
    #[must_use]
    pub fn new(chat: Arc<dyn ChatCompletionProvider>) -> Self {
        Self { chat }
    }
}

#[derive(Deserialize)]
struct RawRankedChunk {
    chunk_id: String,
    score: f32,
}

fn extract_json_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end > start { Some(&text[start..=end]) } else { None }
}

fn build_prompt(query: &str, chunks: &[Chunk], keep: usize) -> String {
    let listed: Vec<String> = chunks
        .iter()
        .map(|c| format!("- id: {} | texto: {}", c.id.as_str(), truncate(&c.text, 400)))
        .collect();
    format!(
        "Dada a pergunta do usuário e uma lista de trechos de um edital de licitação, \
         classifique os {keep} trechos mais relevantes para responder à pergunta.\n\n\
         Pergunta: {query}\n\n\
         Trechos:\n{}\n\n\
         Responda em JSON estrito, uma lista ordenada da maior para a menor relevância, \
         sem texto adicional, no formato: [{{\"chunk_id\": \"...\", \"score\": 0.0-1.0}}, ...]",
        listed.join("\n")
    )
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[async_trait]
impl RerankProvider for LlmRerankProvider {
    async fn rerank(&self, query: &str, chunks: &[Chunk], keep: usize) -> Result<Vec<RerankedChunk>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }
        let prompt = build_prompt(query, chunks, keep);
        let completion = self.chat.complete(&prompt, DEFAULT_LLM_TEMPERATURE_MIN).await?;

        let json = extract_json_array(&completion)
            .ok_or_else(|| Error::Llm { message: "rerank response contained no JSON array".to_owned() })?;
        let raw: Vec<RawRankedChunk> = serde_json::from_str(json)?;

        let valid_ids: std::collections::HashSet<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
        let mut ranked: Vec<RerankedChunk> = raw
            .into_iter()
            .filter(|r| valid_ids.contains(r.chunk_id.as_str()))
            .map(|r| RerankedChunk { chunk_id: r.chunk_id, score: r.score.clamp(0.0, 1.0) })
            .collect();
        ranked.truncate(keep);
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use licita_domain::value_objects::{ChunkId, ChunkType, DocumentId, OpportunityId};

    struct StubChat(&'static str);
    #[async_trait]
    impl ChatCompletionProvider for StubChat {
        async fn complete(&self, _prompt: &str, _temperature: f32) -> Result<String> {
            Ok(self.0.to_owned())
        }
        fn model_name(&self) -> &str {
            "stub"
        }
    }

    fn chunk(id: &str) -> Chunk {
        Chunk {
            id: ChunkId::from_string(id),
            document_id: DocumentId::from_string("d1"),
            opportunity_id: OpportunityId::from_string("o1"),
            text: format!("texto do trecho {id}"),
            chunk_type: ChunkType::Paragraph,
            page_number: Some(1),
            section_title: None,
            token_count: 5,
            char_count: 20,
            embedding: None,
            metadata: std::collections::HashMap::new(),
        }
    }

    #[tokio::test]
    async fn keeps_only_known_chunk_ids_in_ranked_order() {
        let reranker = LlmRerankProvider::new(Arc::new(StubChat(
            r#"[{"chunk_id": "b", "score": 0.9}, {"chunk_id": "unknown", "score": 0.8}, {"chunk_id": "a", "score": 0.5}]"#,
        )));
        let chunks = vec![chunk("a"), chunk("b")];
        let ranked = reranker.rerank("q", &chunks, 8).await.unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].chunk_id, "b");
        assert_eq!(ranked[1].chunk_id, "a");
    }
}
