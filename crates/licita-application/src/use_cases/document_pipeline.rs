//! Document pipeline: Document Extractor (C8) → Chunker (C9) → Embedding
//! Service (C5) → Vector Store (C10), with Dedup Service (C14) gating
//! reprocessing (spec §2 "Query path (RAG)").

use std::io::Read;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use licita_domain::entities::{Chunk, Document};
use licita_domain::error::{Error, Result};
use licita_domain::ports::{
    AttachmentFetcher, DedupProvider, DocumentFingerprint, DocumentRepository, ObjectStorageProvider,
    TextExtractionEngine, VectorStoreProvider,
};
use licita_domain::value_objects::{ChunkId, ChunkType, DocumentId, ExtractionStatus, OpportunityId};

use crate::services::chunker::chunk_text;
use crate::use_cases::embedding_service::EmbeddingService;

/// Sanity bound on ZIP-of-ZIP recursion (spec §4.8).
const MAX_RECURSION_DEPTH: u32 = 5;

pub struct DocumentPipeline {
    attachments: Arc<dyn AttachmentFetcher>,
    /// Extraction engines ordered highest-priority first; the caller
    /// (composition root) is responsible for the ordering, since it's the
    /// one holding [`licita_domain::registry::build_extraction_engines`]
    /// results.
    extraction_chain: Vec<Arc<dyn TextExtractionEngine>>,
    storage: Arc<dyn ObjectStorageProvider>,
    documents: Arc<dyn DocumentRepository>,
    dedup: Arc<dyn DedupProvider>,
    embeddings: Arc<EmbeddingService>,
    vector_store: Arc<dyn VectorStoreProvider>,
}

/// One not-yet-persisted attachment awaiting leaf processing or further
/// unzipping.
struct PendingAttachment {
    title: String,
    bytes: Vec<u8>,
    depth: u32,
}

impl DocumentPipeline {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        attachments: Arc<dyn AttachmentFetcher>,
        extraction_chain: Vec<Arc<dyn TextExtractionEngine>>,
        storage: Arc<dyn ObjectStorageProvider>,
        documents: Arc<dyn DocumentRepository>,
        dedup: Arc<dyn DedupProvider>,
        embeddings: Arc<EmbeddingService>,
        vector_store: Arc<dyn VectorStoreProvider>,
    ) -> Self {
        Self {
            attachments,
            extraction_chain,
            storage,
            documents,
            dedup,
            embeddings,
            vector_store,
        }
    }

    /// Downloads every attachment of `(provider_name, external_id)`,
    /// recursively unpacking ZIPs, extracting text through the engine
    /// chain, and vectorizing each leaf document. Returns the leaf
    /// [`Document`] rows produced or updated.
    pub async fn process_opportunity(
        &self,
        provider_name: &str,
        external_id: &str,
        opportunity_id: &OpportunityId,
    ) -> Result<Vec<Document>> {
        let refs = self.attachments.list_attachments(provider_name, external_id).await?;

        let mut queue: Vec<PendingAttachment> = Vec::new();
        for attachment in refs {
            match self.attachments.download(&attachment.url).await {
                Ok(bytes) => queue.push(PendingAttachment { title: attachment.title, bytes, depth: 0 }),
                Err(err) => {
                    tracing::warn!(url = %attachment.url, error = %err, "attachment download failed");
                }
            }
        }

        let mut leaves = Vec::new();
        while let Some(pending) = queue.pop() {
            if is_zip(&pending.bytes) {
                if pending.depth >= MAX_RECURSION_DEPTH {
                    tracing::warn!(title = %pending.title, "zip recursion depth exceeded, dropping");
                    continue;
                }
                match unzip_entries(&pending.bytes) {
                    Ok(entries) => {
                        for (name, bytes) in entries {
                            queue.push(PendingAttachment { title: name, bytes, depth: pending.depth + 1 });
                        }
                    }
                    Err(err) => tracing::warn!(title = %pending.title, error = %err, "zip extraction failed"),
                }
                continue;
            }
            let document = self.process_leaf(opportunity_id, &pending.title, pending.bytes).await?;
            leaves.push(document);
        }

        Ok(leaves)
    }

    /// Persists one non-ZIP attachment, extracts its text (if it needs
    /// reprocessing) and vectorizes it.
    async fn process_leaf(
        &self,
        opportunity_id: &OpportunityId,
        title: &str,
        bytes: Vec<u8>,
    ) -> Result<Document> {
        let content_hash = sha256_hex(&bytes);
        let size_bytes = bytes.len() as u64;
        let mime_type = sniff_mime(title, &bytes);

        let document_id = DocumentId::new();
        let storage_url = self.storage.put(&storage_key(opportunity_id, &document_id), bytes.clone(), &mime_type).await?;

        let mut document = Document {
            id: document_id.clone(),
            opportunity_id: opportunity_id.clone(),
            title: title.to_owned(),
            storage_url,
            size_bytes,
            content_hash: content_hash.clone(),
            mime_type,
            extraction_status: ExtractionStatus::Pending,
            extracted_text: None,
            extraction_engine: None,
        };
        self.documents.save(&document).await?;

        let fingerprint = DocumentFingerprint {
            url: document.storage_url.clone(),
            size_bytes,
            content_hash: content_hash.clone(),
        };
        if !self.dedup.should_process(&document_id, &fingerprint).await.unwrap_or(true) {
            document.extraction_status = ExtractionStatus::Done;
            return Ok(document);
        }

        match self.extract_text(&document.mime_type, &bytes).await {
            Ok((text, engine_name)) => {
                self.documents
                    .update_extraction(&document_id, ExtractionStatus::Done, Some(&text), Some(&engine_name))
                    .await?;
                document.extraction_status = ExtractionStatus::Done;
                document.extracted_text = Some(text.clone());
                document.extraction_engine = Some(engine_name);

                self.vectorize(&document_id, opportunity_id, &text).await?;
                self.dedup.mark_processed(&document_id, &fingerprint).await?;
            }
            Err(err) => {
                tracing::warn!(document_id = %document_id, error = %err, "extraction failed for every engine");
                self.documents.update_extraction(&document_id, ExtractionStatus::Failed, None, None).await?;
                document.extraction_status = ExtractionStatus::Failed;
            }
        }

        Ok(document)
    }

    /// Tries each engine in the chain until one returns non-empty text
    /// (spec §4.8 extractor chain).
    async fn extract_text(&self, mime_type: &str, bytes: &[u8]) -> Result<(String, String)> {
        let mut last_err: Option<Error> = None;
        for engine in &self.extraction_chain {
            if !engine.supports(mime_type) {
                continue;
            }
            match engine.extract(bytes).await {
                Ok(text) if !text.trim().is_empty() => return Ok((text, engine.engine_name().to_owned())),
                Ok(_) => continue,
                Err(err) => {
                    tracing::debug!(engine = engine.engine_name(), error = %err, "extraction engine failed");
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| Error::Extraction { message: "no engine produced non-empty text".to_owned() }))
    }

    /// Chunks extracted text, embeds every chunk, and persists them to
    /// the vector store (spec C9 → C5 → C10).
    async fn vectorize(&self, document_id: &DocumentId, opportunity_id: &OpportunityId, text: &str) -> Result<()> {
        let drafts = chunk_text(text);
        if drafts.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = drafts.iter().map(|d| d.text.clone()).collect();
        let embeddings = self.embeddings.generate(&texts).await?;

        let chunks: Vec<Chunk> = drafts
            .into_iter()
            .zip(embeddings)
            .map(|(draft, embedding)| {
                let mut metadata = std::collections::HashMap::new();
                metadata.insert("has_overlap".to_owned(), serde_json::Value::Bool(draft.has_overlap));
                Chunk {
                    id: ChunkId::new(),
                    document_id: document_id.clone(),
                    opportunity_id: opportunity_id.clone(),
                    text: draft.text,
                    chunk_type: draft.chunk_type,
                    page_number: Some(draft.page_number),
                    section_title: draft.section_title,
                    token_count: draft.token_count,
                    char_count: draft.char_count,
                    embedding: Some(embedding),
                    metadata,
                }
            })
            .collect();

        self.vector_store.save_chunks(document_id, opportunity_id, &chunks).await
    }
}

fn storage_key(opportunity_id: &OpportunityId, document_id: &DocumentId) -> String {
    format!("opportunities/{opportunity_id}/documents/{document_id}")
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn is_zip(bytes: &[u8]) -> bool {
    bytes.starts_with(b"PK\x03\x04") || bytes.starts_with(b"PK\x05\x06")
}

fn unzip_entries(bytes: &[u8]) -> std::result::Result<Vec<(String, Vec<u8>)>, zip::result::ZipError> {
    let cursor = std::io::Cursor::new(bytes);
    let mut archive = zip::ZipArchive::new(cursor)?;
    let mut entries = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if file.is_dir() {
            continue;
        }
        let name = file.name().to_owned();
        let mut buf = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut buf)?;
        entries.push((name, buf));
    }
    Ok(entries)
}

/// Best-effort MIME sniff by extension, falling back to the ZIP magic
/// bytes check and finally `application/octet-stream`. Real MIME
/// sniffing (magic-byte tables for every office format) is left to the
/// storage backend; this is only used to pick an extraction engine.
fn sniff_mime(title: &str, bytes: &[u8]) -> String {
    let lower = title.to_lowercase();
    if lower.ends_with(".pdf") {
        "application/pdf".to_owned()
    } else if lower.ends_with(".docx") {
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document".to_owned()
    } else if lower.ends_with(".html") || lower.ends_with(".htm") {
        "text/html".to_owned()
    } else if lower.ends_with(".txt") {
        "text/plain".to_owned()
    } else if is_zip(bytes) {
        "application/zip".to_owned()
    } else {
        "application/octet-stream".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use licita_domain::ports::{AttachmentRef, CacheProvider, EmbeddingTier};
    use licita_domain::value_objects::Embedding;
    use std::sync::Mutex;

    struct FakeAttachments {
        refs: Vec<AttachmentRef>,
        blobs: std::collections::HashMap<String, Vec<u8>>,
    }
    #[async_trait]
    impl AttachmentFetcher for FakeAttachments {
        async fn list_attachments(&self, _provider: &str, _external_id: &str) -> Result<Vec<AttachmentRef>> {
            Ok(self.refs.clone())
        }
        async fn download(&self, url: &str) -> Result<Vec<u8>> {
            self.blobs.get(url).cloned().ok_or_else(|| Error::not_found(url))
        }
    }

    struct UppercaseEngine;
    #[async_trait]
    impl TextExtractionEngine for UppercaseEngine {
        fn supports(&self, mime_type: &str) -> bool {
            mime_type == "text/plain"
        }
        fn priority(&self) -> i32 {
            10
        }
        async fn extract(&self, bytes: &[u8]) -> Result<String> {
            Ok(format!("--- PAGE 1 ---\n{}", String::from_utf8_lossy(bytes).to_uppercase()))
        }
        fn engine_name(&self) -> &str {
            "uppercase"
        }
    }

    struct InMemoryStorage {
        blobs: Mutex<std::collections::HashMap<String, Vec<u8>>>,
    }
    #[async_trait]
    impl ObjectStorageProvider for InMemoryStorage {
        async fn put(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<String> {
            self.blobs.lock().unwrap().insert(key.to_owned(), bytes);
            Ok(format!("memory://{key}"))
        }
        async fn get(&self, key: &str) -> Result<Vec<u8>> {
            self.blobs.lock().unwrap().get(key).cloned().ok_or_else(|| Error::not_found(key))
        }
        async fn exists(&self, key: &str) -> Result<bool> {
            Ok(self.blobs.lock().unwrap().contains_key(key))
        }
        async fn delete(&self, key: &str) -> Result<()> {
            self.blobs.lock().unwrap().remove(key);
            Ok(())
        }
    }

    struct InMemoryDocuments {
        rows: Mutex<std::collections::HashMap<String, Document>>,
    }
    #[async_trait]
    impl DocumentRepository for InMemoryDocuments {
        async fn save(&self, document: &Document) -> Result<()> {
            self.rows.lock().unwrap().insert(document.id.as_str().to_owned(), document.clone());
            Ok(())
        }
        async fn get(&self, id: &DocumentId) -> Result<Option<Document>> {
            Ok(self.rows.lock().unwrap().get(id.as_str()).cloned())
        }
        async fn list_for_opportunity(&self, opportunity_id: &OpportunityId) -> Result<Vec<Document>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .values()
                .filter(|d| &d.opportunity_id == opportunity_id)
                .cloned()
                .collect())
        }
        async fn update_extraction(
            &self,
            id: &DocumentId,
            status: ExtractionStatus,
            extracted_text: Option<&str>,
            extraction_engine: Option<&str>,
        ) -> Result<()> {
            if let Some(doc) = self.rows.lock().unwrap().get_mut(id.as_str()) {
                doc.extraction_status = status;
                doc.extracted_text = extracted_text.map(str::to_owned);
                doc.extraction_engine = extraction_engine.map(str::to_owned);
            }
            Ok(())
        }
    }

    struct NeverProcessed;
    #[async_trait]
    impl DedupProvider for NeverProcessed {
        async fn should_process(&self, _id: &DocumentId, _fp: &DocumentFingerprint) -> Result<bool> {
            Ok(true)
        }
        async fn mark_processed(&self, _id: &DocumentId, _fp: &DocumentFingerprint) -> Result<()> {
            Ok(())
        }
    }

    struct DummyCache;
    #[async_trait]
    impl CacheProvider for DummyCache {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
            Ok(None)
        }
        async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Option<u64>) -> Result<()> {
            Ok(())
        }
        async fn scan(&self, _prefix: &str) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
        async fn invalidate(&self, _key: &str) -> Result<()> {
            Ok(())
        }
    }

    struct DummyTier;
    #[async_trait]
    impl EmbeddingTier for DummyTier {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
            Ok(texts.iter().map(|_| Embedding::new(vec![1.0, 0.0], "dummy")).collect())
        }
        fn model_name(&self) -> &str {
            "dummy"
        }
        fn dimensions(&self) -> usize {
            2
        }
        fn tier_name(&self) -> &str {
            "primary"
        }
    }

    struct InMemoryVectorStore {
        saved: Mutex<Vec<Chunk>>,
    }
    #[async_trait]
    impl VectorStoreProvider for InMemoryVectorStore {
        async fn save_chunks(&self, _document_id: &DocumentId, _opportunity_id: &OpportunityId, chunks: &[Chunk]) -> Result<()> {
            self.saved.lock().unwrap().extend_from_slice(chunks);
            Ok(())
        }
        async fn count_chunks(&self, _document_id: &DocumentId) -> Result<usize> {
            Ok(self.saved.lock().unwrap().len())
        }
        async fn delete_chunks_for_document(&self, _document_id: &DocumentId) -> Result<()> {
            Ok(())
        }
        async fn vectorization_status(
            &self,
            _opportunity_id: &OpportunityId,
            _document_ids: &[DocumentId],
        ) -> Result<licita_domain::ports::vector_store::VectorizationStatus> {
            Ok(licita_domain::ports::vector_store::VectorizationStatus { fully_vectorized: true, per_document: Vec::new() })
        }
        async fn vector_search(
            &self,
            _opportunity_id: &OpportunityId,
            _query_embedding: &[f32],
            _limit: usize,
        ) -> Result<Vec<(Chunk, f32)>> {
            Ok(Vec::new())
        }
        async fn keyword_search(
            &self,
            _opportunity_id: &OpportunityId,
            _terms: &[String],
            _limit: usize,
        ) -> Result<Vec<(Chunk, f32)>> {
            Ok(Vec::new())
        }
    }

    fn pipeline(blobs: std::collections::HashMap<String, Vec<u8>>, refs: Vec<AttachmentRef>) -> (DocumentPipeline, Arc<InMemoryVectorStore>) {
        let vector_store = Arc::new(InMemoryVectorStore { saved: Mutex::new(Vec::new()) });
        let pipeline = DocumentPipeline::new(
            Arc::new(FakeAttachments { refs, blobs }),
            vec![Arc::new(UppercaseEngine)],
            Arc::new(InMemoryStorage { blobs: Mutex::new(std::collections::HashMap::new()) }),
            Arc::new(InMemoryDocuments { rows: Mutex::new(std::collections::HashMap::new()) }),
            Arc::new(NeverProcessed),
            Arc::new(EmbeddingService::new(vec![Arc::new(DummyTier)], Arc::new(DummyCache))),
            vector_store.clone(),
        );
        (pipeline, vector_store)
    }

    #[tokio::test]
    async fn extracts_and_vectorizes_a_plain_text_attachment() {
        let long_text = "Edital de licitação para aquisição de materiais diversos de escritório e papelaria. ".repeat(20);
        let mut blobs = std::collections::HashMap::new();
        blobs.insert("https://example/a.txt".to_owned(), long_text.into_bytes());
        let (pipeline, vector_store) = pipeline(
            blobs,
            vec![AttachmentRef { title: "edital.txt".to_owned(), url: "https://example/a.txt".to_owned() }],
        );

        let opportunity_id = OpportunityId::from_string("opp-1");
        let docs = pipeline.process_opportunity("rest_portal", "1", &opportunity_id).await.unwrap();

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].extraction_status, ExtractionStatus::Done);
        assert!(docs[0].extracted_text.as_ref().unwrap().contains("LICITAÇÃO") || docs[0].extracted_text.as_ref().unwrap().to_uppercase().contains("LICITA"));
        assert!(!vector_store.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn recursive_zip_of_zip_yields_two_leaf_documents() {
        use std::io::Write as _;

        let inner_pdf = b"not a real pdf but long enough text content here".to_vec();
        let mut inner_zip_buf = Vec::new();
        {
            let mut writer = zip::ZipWriter::new(std::io::Cursor::new(&mut inner_zip_buf));
            let options = zip::write::SimpleFileOptions::default();
            writer.start_file("report.pdf", options).unwrap();
            writer.write_all(&inner_pdf).unwrap();
            writer.finish().unwrap();
        }
        let mut outer_zip_buf = Vec::new();
        {
            let mut writer = zip::ZipWriter::new(std::io::Cursor::new(&mut outer_zip_buf));
            let options = zip::write::SimpleFileOptions::default();
            writer.start_file("a.zip", options).unwrap();
            writer.write_all(&inner_zip_buf).unwrap();
            writer.start_file("notice.txt", options).unwrap();
            writer
                .write_all(b"aviso de licitacao em texto simples e razoavelmente longo para exceder o minimo")
                .unwrap();
            writer.finish().unwrap();
        }

        let mut blobs = std::collections::HashMap::new();
        blobs.insert("https://example/bundle.zip".to_owned(), outer_zip_buf);
        let (pipeline, _vector_store) = pipeline(
            blobs,
            vec![AttachmentRef { title: "bundle.zip".to_owned(), url: "https://example/bundle.zip".to_owned() }],
        );

        let opportunity_id = OpportunityId::from_string("opp-2");
        let docs = pipeline.process_opportunity("rest_portal", "2", &opportunity_id).await.unwrap();
        assert_eq!(docs.len(), 2);
        let hashes: std::collections::HashSet<_> = docs.iter().map(|d| d.content_hash.clone()).collect();
        assert_eq!(hashes.len(), 2);
    }
}
