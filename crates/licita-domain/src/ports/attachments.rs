//! Attachment fetching port, the HTTP-facing half of the Document
//! Extractor (spec C8 / §4.8 step 1-2). Kept separate from
//! [`crate::ports::providers::ProviderAdapter`] because not every
//! provider need expose it the same way, and the download step itself is
//! provider-agnostic once a URL is known.

use async_trait::async_trait;

use crate::error::Result;

/// One attachment as listed by a provider, before it is downloaded.
#[derive(Debug, Clone)]
pub struct AttachmentRef {
    pub title: String,
    pub url: String,
}

#[async_trait]
pub trait AttachmentFetcher: Send + Sync {
    /// Lists the attachments of one opportunity (by `external_id`) from
    /// its provider's attachment-listing endpoint.
    async fn list_attachments(&self, provider_name: &str, external_id: &str) -> Result<Vec<AttachmentRef>>;

    /// Downloads the raw bytes of one attachment URL.
    async fn download(&self, url: &str) -> Result<Vec<u8>>;
}
