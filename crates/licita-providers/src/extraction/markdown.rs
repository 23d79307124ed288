//! Handles `text/plain`, `text/markdown` and `text/html` attachments —
//! the formats that need no real conversion, just HTML tag stripping
//! (spec §4.8: "markdown/plain-text passthrough, HTML stripped to text").

use async_trait::async_trait;
use scraper::Html;

use licita_domain::error::Result;
use licita_domain::ports::extraction::TextExtractionEngine;
use licita_domain::registry::{ExtractionEngineConfig, ExtractionEngineRegistryEntry, EXTRACTION_ENGINES};

pub struct MarkdownConverter;

fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    document.root_element().text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

#[async_trait]
impl TextExtractionEngine for MarkdownConverter {
    fn supports(&self, mime_type: &str) -> bool {
        matches!(mime_type, "text/plain" | "text/markdown" | "text/html")
    }

    fn priority(&self) -> i32 {
        50
    }

    async fn extract(&self, bytes: &[u8]) -> Result<String> {
        let raw = String::from_utf8_lossy(bytes);
        if raw.trim_start().starts_with('<') {
            Ok(html_to_text(&raw))
        } else {
            Ok(raw.into_owned())
        }
    }

    fn engine_name(&self) -> &str {
        "markdown_converter"
    }
}

fn markdown_converter_factory(_config: &ExtractionEngineConfig) -> std::result::Result<std::sync::Arc<dyn TextExtractionEngine>, String> {
    Ok(std::sync::Arc::new(MarkdownConverter))
}

#[linkme::distributed_slice(EXTRACTION_ENGINES)]
static MARKDOWN_CONVERTER: ExtractionEngineRegistryEntry = ExtractionEngineRegistryEntry {
    name: "markdown_converter",
    description: "passthrough for text/plain and text/markdown, tag-stripping for text/html",
    build: markdown_converter_factory,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn strips_html_tags() {
        let engine = MarkdownConverter;
        let text = engine.extract(b"<html><body><p>Edital <b>123</b></p></body></html>").await.unwrap();
        assert_eq!(text, "Edital 123");
    }

    #[tokio::test]
    async fn passes_plain_text_through() {
        let engine = MarkdownConverter;
        let text = engine.extract(b"aviso de licitacao").await.unwrap();
        assert_eq!(text, "aviso de licitacao");
    }
}
