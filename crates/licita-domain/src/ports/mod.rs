//! Hexagonal ports: the trait boundaries `licita-application` programs
//! against and `licita-providers`/`licita-infrastructure` implement.

pub mod attachments;
pub mod cache;
pub mod dedup;
pub mod documents;
pub mod embedding;
pub mod extraction;
pub mod llm;
pub mod mapper;
pub mod persistence;
pub mod providers;
pub mod storage;
pub mod vector_store;

pub use attachments::{AttachmentFetcher, AttachmentRef};
pub use cache::CacheProvider;
pub use dedup::{DedupProvider, DocumentFingerprint};
pub use documents::DocumentRepository;
pub use embedding::EmbeddingTier;
pub use extraction::TextExtractionEngine;
pub use llm::{
    AnswerProvider, ChatCompletionProvider, LlmValidatorProvider, RerankProvider, RerankedChunk,
    SynonymProvider, ValidationVerdict,
};
pub use mapper::{DataMapper, OpportunityRow};
pub use persistence::{
    BatchSaveResult, PersistenceFilters, PersistenceService, PersistenceStats, ProviderStat,
};
pub use providers::ProviderAdapter;
pub use storage::ObjectStorageProvider;
pub use vector_store::{DocumentVectorizationStatus, VectorStoreProvider, VectorizationStatus};
