//! Tuned defaults, all overridable via configuration (see
//! `licita-infrastructure::config`). Kept in one place so the matching,
//! chunking and retrieval pipelines read a single source of truth.

/// Minimum cosine similarity for a company/opportunity pair to reach the
/// LLM validation gate (C7).
pub const DEFAULT_VECTOR_SIMILARITY_THRESHOLD: f32 = 0.65;

/// Sampling temperature range for the LLM validator/answerer, tuned low
/// for determinism.
pub const DEFAULT_LLM_TEMPERATURE_MIN: f32 = 0.1;
pub const DEFAULT_LLM_TEMPERATURE_MAX: f32 = 0.2;

/// Default embedding batch size (C5).
pub const DEFAULT_EMBEDDING_BATCH_SIZE: usize = 64;

/// Target chunk size in characters (~800 tokens at ~4 chars/token, C9).
pub const DEFAULT_CHUNK_SIZE_CHARS: usize = 3200;

/// Overlap carried from a chunk's predecessor, in characters (~25 tokens).
pub const DEFAULT_CHUNK_OVERLAP_CHARS: usize = 100;

/// Chunks shorter than this are dropped after overlap is applied.
pub const DEFAULT_MIN_CHUNK_SIZE_CHARS: usize = 100;

/// Hybrid search score weights (C10): final = vector_weight * cosine +
/// keyword_weight * keyword_score.
pub const HYBRID_SEARCH_VECTOR_WEIGHT: f32 = 0.7;
pub const HYBRID_SEARCH_KEYWORD_WEIGHT: f32 = 0.3;

/// Vector-search and keyword-search each fetch `2 * limit` candidates
/// before the union+dedup step (C10).
pub const HYBRID_SEARCH_CANDIDATE_MULTIPLIER: usize = 2;

/// Retrieval & Answer Engine: chunks retrieved before rerank, and chunks
/// kept after rerank (C11).
pub const RAG_RETRIEVAL_CANDIDATES: usize = 12;
pub const RAG_RERANKED_CHUNKS: usize = 8;

/// RAG answer cache TTL in seconds (1 hour, C12/§8 scenario 5).
pub const RAG_ANSWER_CACHE_TTL_SECONDS: u64 = 3600;

/// REST adapter parallel fetch policy (C1/§5): pages grouped into
/// batches of this size, dispatched to a worker pool of the same size.
pub const REST_FETCH_BATCH_SIZE: usize = 20;

/// Inter-batch sleep for rate control.
pub const REST_FETCH_BATCH_SLEEP_MS: u64 = 500;

/// Consecutive empty batches before the REST adapter stops paginating.
pub const REST_FETCH_MAX_EMPTY_BATCHES: u32 = 5;

/// A page returning fewer than this many rows signals "no more pages".
pub const REST_FETCH_PAGE_FULL_SIZE: usize = 50;

/// Default search window applied when a provider adapter is not given
/// explicit publication-date filters: 14 days in the past to 120 days
/// ahead.
pub const DEFAULT_SEARCH_WINDOW_PAST_DAYS: i64 = 14;
pub const DEFAULT_SEARCH_WINDOW_FUTURE_DAYS: i64 = 120;

/// National source cache TTL (§5): upstream portal responses are cached
/// for this long before a re-fetch is attempted.
pub const SOURCE_CACHE_TTL_SECONDS: u64 = 24 * 3600;

/// Synonym expansion cache TTL: effectively permanent (`None` passed to
/// [`crate::ports::cache::CacheProvider::set`]), documented here for
/// discoverability.
pub const SYNONYM_CACHE_TTL_SECONDS: Option<u64> = None;

/// Maximum synonyms returned per term, including the original.
pub const DEFAULT_SYNONYM_EXPANSION_MAX: usize = 5;
