//! LLM-backed providers (spec C6, C11, C13). A single HTTP chat client
//! ([`HttpChatClient`]) is the one thing actually talking to an LLM
//! endpoint; the synonym, validator, rerank and answer services are
//! thin prompt/parse wrappers built on top of it (spec §6: "one or
//! more LLM endpoints" shared across use cases).

mod answer;
mod http_client;
mod rerank;
mod synonym;
mod validator;

pub use answer::LlmAnswerProvider;
pub use http_client::HttpChatClient;
pub use rerank::LlmRerankProvider;
pub use synonym::LlmSynonymProvider;
pub use validator::LlmValidator;
