//! Last-resort PDF engine (spec C8): a byte-level scan for `(...) Tj` /
//! `(...) TJ` text-showing operators, for PDFs malformed enough that
//! [`super::PdfPrimaryEngine`] errors out entirely. Cannot recover real
//! page boundaries from a raw byte scan, so the whole document is
//! reported as a single page — better than losing the document, worse
//! than a real parse.

use async_trait::async_trait;

use licita_domain::error::{Error, Result};
use licita_domain::ports::extraction::TextExtractionEngine;
use licita_domain::registry::{ExtractionEngineConfig, ExtractionEngineRegistryEntry, EXTRACTION_ENGINES};

pub struct PdfRawStreamEngine;

/// Pulls the literal-string operands of `Tj`/`TJ` operators out of a raw
/// PDF byte stream, unescaping `\(`, `\)` and `\\`.
fn scan_text_operators(bytes: &[u8]) -> String {
    let mut out = String::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'(' {
            let mut j = i + 1;
            let mut literal = Vec::new();
            let mut depth = 1;
            while j < bytes.len() && depth > 0 {
                match bytes[j] {
                    b'\\' if j + 1 < bytes.len() => {
                        literal.push(bytes[j + 1]);
                        j += 2;
                        continue;
                    }
                    b'(' => depth += 1,
                    b')' => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    _ => {}
                }
                literal.push(bytes[j]);
                j += 1;
            }
            // Only keep it if the closing paren is followed (within a few
            // bytes) by a `Tj`/`TJ` operator, else it's not a text show.
            let tail = &bytes[(j + 1).min(bytes.len())..(j + 6).min(bytes.len())];
            if tail.windows(2).any(|w| w == b"Tj" || w == b"TJ") {
                out.push_str(&String::from_utf8_lossy(&literal));
                out.push(' ');
            }
            i = j + 1;
        } else {
            i += 1;
        }
    }
    out
}

#[async_trait]
impl TextExtractionEngine for PdfRawStreamEngine {
    fn supports(&self, mime_type: &str) -> bool {
        mime_type == "application/pdf"
    }

    fn priority(&self) -> i32 {
        10
    }

    async fn extract(&self, bytes: &[u8]) -> Result<String> {
        let bytes = bytes.to_vec();
        let text = tokio::task::spawn_blocking(move || scan_text_operators(&bytes))
            .await
            .map_err(|e| Error::Extraction { message: format!("raw pdf scan task panicked: {e}") })?;
        if text.trim().is_empty() {
            return Err(Error::Extraction { message: "raw PDF scan found no text-showing operators".to_owned() });
        }
        Ok(format!("--- PAGE 1 ---\n{text}"))
    }

    fn engine_name(&self) -> &str {
        "pdf_raw_stream"
    }
}

fn pdf_raw_stream_factory(_config: &ExtractionEngineConfig) -> std::result::Result<std::sync::Arc<dyn TextExtractionEngine>, String> {
    Ok(std::sync::Arc::new(PdfRawStreamEngine))
}

#[linkme::distributed_slice(EXTRACTION_ENGINES)]
static PDF_RAW_STREAM_ENGINE: ExtractionEngineRegistryEntry = ExtractionEngineRegistryEntry {
    name: "pdf_raw_stream",
    description: "last-resort byte-level Tj/TJ operator scan for malformed PDFs",
    build: pdf_raw_stream_factory,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn extracts_literal_strings_before_tj_operators() {
        let engine = PdfRawStreamEngine;
        let stream = b"BT /F1 12 Tf (Edital de Licitacao) Tj ET";
        let text = engine.extract(stream).await.unwrap();
        assert!(text.contains("Edital de Licitacao"));
    }

    #[tokio::test]
    async fn unescapes_parentheses_and_backslashes() {
        let stream = b"(preco \\(unitario\\)) Tj";
        let text = scan_text_operators(stream);
        assert_eq!(text.trim(), "preco (unitario)");
    }

    #[tokio::test]
    async fn errors_when_no_text_operators_found() {
        let engine = PdfRawStreamEngine;
        assert!(engine.extract(b"not a pdf stream at all").await.is_err());
    }
}
