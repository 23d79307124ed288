//! Primary PDF engine (spec C8), backed by `pdf-extract`. Runs on a
//! blocking thread since `pdf-extract` is synchronous and can take
//! several hundred milliseconds on large tenders' edital PDFs.

use async_trait::async_trait;

use licita_domain::error::{Error, Result};
use licita_domain::ports::extraction::TextExtractionEngine;
use licita_domain::registry::{ExtractionEngineConfig, ExtractionEngineRegistryEntry, EXTRACTION_ENGINES};

pub struct PdfPrimaryEngine;

#[async_trait]
impl TextExtractionEngine for PdfPrimaryEngine {
    fn supports(&self, mime_type: &str) -> bool {
        mime_type == "application/pdf"
    }

    fn priority(&self) -> i32 {
        100
    }

    async fn extract(&self, bytes: &[u8]) -> Result<String> {
        let bytes = bytes.to_vec();
        tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
            .await
            .map_err(|e| Error::Extraction { message: format!("pdf extraction task panicked: {e}") })?
            .map_err(|e| Error::Extraction { message: format!("pdf-extract failed: {e}") })
    }

    fn engine_name(&self) -> &str {
        "pdf_primary"
    }
}

fn pdf_primary_factory(_config: &ExtractionEngineConfig) -> std::result::Result<std::sync::Arc<dyn TextExtractionEngine>, String> {
    Ok(std::sync::Arc::new(PdfPrimaryEngine))
}

#[linkme::distributed_slice(EXTRACTION_ENGINES)]
static PDF_PRIMARY_ENGINE: ExtractionEngineRegistryEntry = ExtractionEngineRegistryEntry {
    name: "pdf_primary",
    description: "pdf-extract based PDF text extraction",
    build: pdf_primary_factory,
};
