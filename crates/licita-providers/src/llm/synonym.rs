//! Synonym Service LLM backend (spec C6 / §4.4).

use std::sync::Arc;

use async_trait::async_trait;

use licita_domain::constants::DEFAULT_LLM_TEMPERATURE_MIN;
use licita_domain::error::Result;
use licita_domain::ports::{ChatCompletionProvider, SynonymProvider};
use licita_domain::utils::text::normalize;

pub struct LlmSynonymProvider {
    chat: Arc<dyn ChatCompletionProvider>,
}

impl LlmSynonymProvider {
    #[must_use]
    pub fn new(chat: Arc<dyn ChatCompletionProvider>) -> Self {
        Self { chat }
    }
}

#[async_trait]
impl SynonymProvider for LlmSynonymProvider {
    async fn expand(&self, term: &str, max: usize) -> Result<Vec<String>> {
        let prompt = format!(
            "Liste até {} sinônimos ou termos relacionados em português do Brasil para o termo de busca \
             de licitação pública abaixo, usado em compras governamentais. Responda apenas com os termos \
             separados por vírgula, sem numeração e sem explicações.\n\nTermo: {term}",
            max.saturating_sub(1).max(1)
        );

        let completion = self.chat.complete(&prompt, DEFAULT_LLM_TEMPERATURE_MIN).await?;

        let mut seen = std::collections::HashSet::new();
        let mut out = vec![term.to_owned()];
        seen.insert(normalize(term));

        for candidate in completion.split(',') {
            let candidate = candidate.trim().trim_matches(|c: char| c == '"' || c.is_numeric() || c == '.').trim();
            if candidate.is_empty() {
                continue;
            }
            let key = normalize(candidate);
            if seen.insert(key) {
                out.push(candidate.to_owned());
            }
            if out.len() >= max {
                break;
            }
        }
        out.truncate(max);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[tokio::test]
    async fn original_term_always_leads_and_duplicates_are_dropped() {
        let provider = LlmSynonymProvider::new(Arc::new(StubChat("notebook, Notebook, laptop, computador portátil")));
        let terms = provider.expand("notebook", 5).await.unwrap();
        assert_eq!(terms[0], "notebook");
        assert!(terms.iter().filter(|t| t.eq_ignore_ascii_case("notebook")).count() == 1);
        assert!(terms.len() <= 5);
    }
}
