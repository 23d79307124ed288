//! Text extraction engine port (spec C8 / §4.8).
//!
//! Multiple engines may claim the same document; the application-layer
//! pipeline tries them in descending [`TextExtractionEngine::priority`]
//! order and falls through on error, exactly like the embedding tier
//! fallback chain in [`crate::ports::embedding`].

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait TextExtractionEngine: Send + Sync {
    /// Whether this engine claims to handle `mime_type` (e.g.
    /// `application/pdf`, `text/html`). A wildcard engine may return `true`
    /// unconditionally and rely on [`TextExtractionEngine::priority`] to
    /// rank it last.
    fn supports(&self, mime_type: &str) -> bool;

    /// Higher runs first. Ties broken by registration order.
    fn priority(&self) -> i32;

    /// Extracts plain text from `bytes`. Implementations that understand
    /// page boundaries should emit `--- PAGE N ---` marker lines so
    /// downstream chunking can recover page numbers
    /// (see [`crate::utils::text::extract_page_markers`]).
    async fn extract(&self, bytes: &[u8]) -> Result<String>;

    fn engine_name(&self) -> &str;
}
