//! Answer composer for the Retrieval & Answer Engine (spec C11 / §4.11
//! step 5): grounds the response in the reranked chunks only, citing
//! `(document, page)` the way the retrieval engine's `AnswerSource`
//! expects downstream.

use std::sync::Arc;

use async_trait::async_trait;

use licita_domain::constants::DEFAULT_LLM_TEMPERATURE_MAX;
use licita_domain::entities::{Chunk, Opportunity};
use licita_domain::error::Result;
use licita_domain::ports::{AnswerProvider, ChatCompletionProvider};

pub struct LlmAnswerProvider {
    chat: Arc<dyn ChatCompletionProvider>,
}

impl LlmAnswerProvider {
    #[must_use]
    pub fn new(chat: Arc<dyn ChatCompletionProvider>) -> Self {
        Self { chat }
    }
}

fn build_prompt(opportunity: &Opportunity, query: &str, chunks: &[Chunk]) -> String {
    let context: Vec<String> = chunks
        .iter()
        .map(|c| {
            let page = c.page_number.map(|p| format!("página {p}")).unwrap_or_else(|| "página desconhecida".to_owned());
            format!("[{page}] {}", c.text)
        })
        .collect();

    format!(
        "Você responde perguntas sobre um edital de licitação pública brasileira usando apenas \
         o contexto fornecido abaixo. Se a resposta não estiver no contexto, diga que a informação \
         não foi encontrada no edital. Cite a página entre parênteses ao final de cada afirmação.\n\n\
         Licitação: {}\n\n\
         Contexto:\n{}\n\n\
         Pergunta: {query}",
        opportunity.title,
        context.join("\n\n"),
    )
}

#[async_trait]
impl AnswerProvider for LlmAnswerProvider {
    async fn answer(&self, opportunity: &Opportunity, query: &str, chunks: &[Chunk]) -> Result<String> {
        let prompt = build_prompt(opportunity, query, chunks);
        self.chat.complete(&prompt, DEFAULT_LLM_TEMPERATURE_MAX).await
    }
}
