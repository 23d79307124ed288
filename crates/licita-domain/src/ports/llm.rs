//! LLM-backed ports: Synonym Service (C6), LLM Validator (C13), and the
//! reranker/answerer used by the Retrieval & Answer Engine (C11).

use async_trait::async_trait;

use crate::entities::{Chunk, Company, Opportunity};
use crate::error::Result;

/// Raw chat-completion client, the one thing every LLM-backed service in
/// `licita-providers` is actually built on (spec §6: "one or more LLM
/// endpoints"). Kept separate from the semantic ports below so a single
/// concrete provider (e.g. one HTTP client hitting one endpoint) can serve
/// all four use cases by implementing all four traits.
#[async_trait]
pub trait ChatCompletionProvider: Send + Sync {
    /// Sends `prompt` with the given sampling temperature and returns the
    /// model's raw text completion.
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String>;

    fn model_name(&self) -> &str;
}

/// C6: expand a keyword into related Brazilian-Portuguese terms.
#[async_trait]
pub trait SynonymProvider: Send + Sync {
    /// The original term is always the first element of the result.
    async fn expand(&self, term: &str, max: usize) -> Result<Vec<String>>;
}

/// Verdict returned by [`LlmValidatorProvider::validate`].
#[derive(Debug, Clone)]
pub struct ValidationVerdict {
    pub approved: bool,
    pub reasoning: String,
    pub confidence: f32,
}

/// C13: one-shot "is this company a plausible supplier for this
/// opportunity" classification.
#[async_trait]
pub trait LlmValidatorProvider: Send + Sync {
    async fn validate(
        &self,
        company: &Company,
        opportunity: &Opportunity,
        similarity_score: f32,
    ) -> Result<ValidationVerdict>;
}

/// Relevance-ranked chunk id with its rerank score, used by C11.
#[derive(Debug, Clone)]
pub struct RerankedChunk {
    pub chunk_id: String,
    pub score: f32,
}

/// Reranks retrieved chunks against a query, narrowing the candidate set
/// (spec §4.11 step 4: 12 candidates down to 8).
#[async_trait]
pub trait RerankProvider: Send + Sync {
    async fn rerank(&self, query: &str, chunks: &[Chunk], keep: usize) -> Result<Vec<RerankedChunk>>;
}

/// Composes a prompt from opportunity metadata + retrieved chunks and
/// returns the model's grounded answer text (spec §4.11 step 5).
#[async_trait]
pub trait AnswerProvider: Send + Sync {
    async fn answer(&self, opportunity: &Opportunity, query: &str, chunks: &[Chunk]) -> Result<String>;
}
