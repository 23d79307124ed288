//! LLM Validator (spec C13 / §4.13): a second, semantic gate after the
//! vector-similarity threshold, before a match is persisted.

use std::sync::Arc;

use serde::Deserialize;

use async_trait::async_trait;
use licita_domain::constants::DEFAULT_LLM_TEMPERATURE_MIN;
use licita_domain::entities::{Company, Opportunity};
use licita_domain::error::Result;
use licita_domain::ports::{ChatCompletionProvider, LlmValidatorProvider, ValidationVerdict};

pub struct LlmValidator {
    chat: Arc<dyn ChatCompletionProvider>,
}

impl LlmValidator {
    #[must_use]
    pub fn new(chat: Arc<dyn ChatCompletionProvider>) -> Self {
        Self { chat }
    }
}

#[derive(Deserialize)]
struct RawVerdict {
    approved: bool,
    #[serde(default)]
    reasoning: String,
    #[serde(default = "default_confidence")]
    confidence: f32,
}

fn default_confidence() -> f32 {
    0.5
}

const MAX_PROMPT_ITEMS: usize = 3;
const MAX_ITEM_DESCRIPTION_CHARS: usize = 200;

fn build_prompt(company: &Company, opportunity: &Opportunity, similarity_score: f32) -> String {
    let items: String = opportunity
        .items
        .iter()
        .take(MAX_PROMPT_ITEMS)
        .map(|item| truncate_chars(&item.description, MAX_ITEM_DESCRIPTION_CHARS))
        .collect::<Vec<_>>()
        .join("; ");

    format!(
        "Você avalia se uma empresa é uma fornecedora plausível para uma licitação pública brasileira.\n\
         A similaridade vetorial entre o perfil da empresa e o objeto da licitação foi {similarity_score:.3}.\n\n\
         Empresa: {}\n\
         Descrição: {}\n\
         Produtos: {}\n\n\
         Licitação: {}\n\
         Objeto: {}\n\
         Itens: {}\n\n\
         Responda em JSON estrito, sem texto adicional, no formato: \
         {{\"approved\": true|false, \"reasoning\": \"...\", \"confidence\": 0.0-1.0}}",
        company.legal_name,
        company.description,
        company.products.join(", "),
        opportunity.title,
        opportunity.description,
        items,
    )
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_owned()
    } else {
        text.chars().take(max_chars).collect::<String>() + "..."
    }
}

/// Pulls the first `{...}` block out of a completion that may wrap JSON
/// in prose or a markdown code fence despite being asked not to.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start { Some(&text[start..=end]) } else { None }
}

#[async_trait]
impl LlmValidatorProvider for LlmValidator {
    async fn validate(&self, company: &Company, opportunity: &Opportunity, similarity_score: f32) -> Result<ValidationVerdict> {
        let prompt = build_prompt(company, opportunity, similarity_score);
        let completion = self.chat.complete(&prompt, DEFAULT_LLM_TEMPERATURE_MIN).await?;

        let parsed = extract_json_object(&completion).and_then(|json| serde_json::from_str::<RawVerdict>(json).ok());

        Ok(match parsed {
            Some(raw) => ValidationVerdict {
                approved: raw.approved,
                reasoning: raw.reasoning,
                confidence: raw.confidence.clamp(0.0, 1.0),
            },
            None => heuristic_verdict(&completion),
        })
    }
}

/// Falls back to a keyword scan when the completion carries no parseable
/// JSON verdict (spec §4.13): any of "true"/"aprovado"/"sim" anywhere in
/// the response is taken as acceptance, otherwise the pair defaults to
/// rejected with the raw completion kept as the reasoning.
fn heuristic_verdict(completion: &str) -> ValidationVerdict {
    let lowered = completion.to_lowercase();
    let approved = ["true", "aprovado", "sim"].iter().any(|kw| lowered.contains(kw));
    ValidationVerdict {
        approved,
        reasoning: format!("heuristic fallback (no parseable JSON verdict): {completion}"),
        confidence: default_confidence(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use licita_domain::value_objects::CompanyId;

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

    fn company() -> Company {
        Company {
            id: CompanyId::from_string("c1"),
            legal_name: "Papelaria Acme".to_owned(),
            trade_name: None,
            tax_id: "000".to_owned(),
            description: "fornecedor de papelaria".to_owned(),
            products: vec!["papel".to_owned()],
            keywords: vec![],
            owner_user_id: None,
        }
    }

    fn opportunity() -> Opportunity {
        Opportunity {
            provider_name: "rest_portal".to_owned(),
            external_id: "1".to_owned(),
            title: "compra de papel A4".to_owned(),
            description: String::new(),
            estimated_value: None,
            currency_code: "BRL".to_owned(),
            country_code: "BR".to_owned(),
            region_code: None,
            municipality: None,
            publication_date: None,
            submission_deadline: None,
            opening_date: None,
            procuring_entity_id: None,
            procuring_entity_name: None,
            provider_specific_data: serde_json::Value::Null,
            items: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn parses_json_even_when_wrapped_in_prose() {
        let chat = StubChat("Claro, aqui está: {\"approved\": true, \"reasoning\": \"match\", \"confidence\": 0.9} obrigado");
        let validator = LlmValidator::new(Arc::new(chat));
        let verdict = validator.validate(&company(), &opportunity(), 0.8).await.unwrap();
        assert!(verdict.approved);
        assert!((verdict.confidence - 0.9).abs() < 1e-6);
    }

    #[tokio::test]
    async fn falls_back_to_heuristic_when_response_has_no_json() {
        let validator = LlmValidator::new(Arc::new(StubChat("sem json aqui")));
        let verdict = validator.validate(&company(), &opportunity(), 0.8).await.unwrap();
        assert!(!verdict.approved);
        assert!(verdict.reasoning.contains("heuristic fallback"));
    }

    #[tokio::test]
    async fn heuristic_fallback_accepts_on_keyword_match() {
        let validator = LlmValidator::new(Arc::new(StubChat("Análise: aprovado, parece compatível")));
        let verdict = validator.validate(&company(), &opportunity(), 0.8).await.unwrap();
        assert!(verdict.approved);
    }
}
