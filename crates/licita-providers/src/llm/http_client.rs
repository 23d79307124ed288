//! OpenAI-compatible chat completion client, registered under the LLM
//! provider registry (spec C6/C11/C13's shared backend).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use licita_domain::error::{Error, Result};
use licita_domain::ports::ChatCompletionProvider;
use licita_domain::registry::{LlmProviderConfig, LlmProviderRegistryEntry, LLM_PROVIDERS};

use crate::http::build_client;

pub struct HttpChatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

impl HttpChatClient {
    #[must_use]
    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        Self { client: build_client(Duration::from_secs(60)), base_url, api_key, model }
    }
}

#[async_trait]
impl ChatCompletionProvider for HttpChatClient {
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            temperature,
            messages: vec![ChatMessage { role: "user", content: prompt }],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::upstream_transient("llm", e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(Error::Upstream {
                provider: "llm".to_owned(),
                message: format!("HTTP {status}"),
                transient: status.is_server_error() || status.as_u16() == 429,
            });
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::upstream_permanent("llm", format!("bad response shape: {e}")))?;
        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::Llm { message: "empty choices array".to_owned() })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn http_chat_factory(config: &LlmProviderConfig) -> std::result::Result<Arc<dyn ChatCompletionProvider>, String> {
    let base_url = config.base_url.clone().ok_or_else(|| "http_chat provider requires base_url".to_owned())?;
    let api_key = config.api_key.clone().unwrap_or_default();
    let model = config.model.clone().ok_or_else(|| "http_chat provider requires model".to_owned())?;
    Ok(Arc::new(HttpChatClient::new(base_url, api_key, model)))
}

#[linkme::distributed_slice(LLM_PROVIDERS)]
static HTTP_CHAT_PROVIDER: LlmProviderRegistryEntry = LlmProviderRegistryEntry {
    name: "http_chat",
    description: "OpenAI-compatible chat completion endpoint",
    build: http_chat_factory,
};
