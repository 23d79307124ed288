//! Error handling types.

use thiserror::Error;

/// Result type alias used across the core.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the Licita Match engine.
///
/// Components return structured results; only invariant violations (bugs,
/// not runtime conditions) panic. See spec §7 for the category mapping.
#[derive(Error, Debug)]
pub enum Error {
    /// Requested resource does not exist.
    #[error("not found: {resource}")]
    NotFound {
        /// Description of the missing resource.
        resource: String,
    },

    /// Caller supplied a value that fails validation.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// What was wrong with the argument.
        message: String,
    },

    /// An upstream provider (REST portal, scrape portal, LLM, embedding API)
    /// failed transiently or permanently. The call site decides whether to
    /// retry or degrade.
    #[error("upstream error ({provider}): {message}")]
    Upstream {
        /// Name of the upstream provider.
        provider: String,
        /// Human readable detail.
        message: String,
        /// Whether the error is believed transient (worth retrying).
        transient: bool,
    },

    /// A single record failed a mapper/persistence validation rule.
    #[error("validation failed: {message}")]
    Validation {
        /// Description of the violated rule.
        message: String,
    },

    /// A resource pool (DB connections, embedding batch) was exhausted.
    #[error("resource exhausted: {message}")]
    ResourceExhausted {
        /// Description of the exhausted resource.
        message: String,
    },

    /// Configuration is missing or invalid.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// Embedding provider failure (all tiers exhausted, or dimension
    /// mismatch).
    #[error("embedding error: {message}")]
    Embedding {
        /// Description of the embedding failure.
        message: String,
    },

    /// Vector store failure.
    #[error("vector store error: {message}")]
    VectorStore {
        /// Description of the failure.
        message: String,
    },

    /// LLM call failure (synonym expansion, validation, answering, rerank).
    #[error("llm error: {message}")]
    Llm {
        /// Description of the failure.
        message: String,
    },

    /// Document extraction failure (download, unzip, text extraction).
    #[error("extraction error: {message}")]
    Extraction {
        /// Description of the failure.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Database error.
    #[error("database error: {message}")]
    Database {
        /// Description of the database failure.
        message: String,
    },

    /// JSON (de)serialization error.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Programmer error: an invariant the code relies on was violated. The
    /// only category that should ever accompany a `panic!` at the call
    /// site instead of being returned, when truly unrecoverable.
    #[error("internal invariant violated: {message}")]
    Internal {
        /// Description of the violated invariant.
        message: String,
    },
}

impl Error {
    /// Shorthand for a transient upstream error.
    #[must_use]
    pub fn upstream_transient(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upstream {
            provider: provider.into(),
            message: message.into(),
            transient: true,
        }
    }

    /// Shorthand for a permanent upstream error.
    #[must_use]
    pub fn upstream_permanent(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upstream {
            provider: provider.into(),
            message: message.into(),
            transient: false,
        }
    }

    /// Shorthand for [`Error::NotFound`].
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Shorthand for [`Error::InvalidArgument`].
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Shorthand for [`Error::Configuration`].
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Shorthand for [`Error::Embedding`].
    #[must_use]
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding {
            message: message.into(),
        }
    }

    /// Shorthand for [`Error::VectorStore`].
    #[must_use]
    pub fn vector_store(message: impl Into<String>) -> Self {
        Self::VectorStore {
            message: message.into(),
        }
    }

    /// Shorthand for [`Error::Database`].
    #[must_use]
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    /// True if this error is plausibly resolved by a retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Upstream { transient: true, .. })
            || matches!(self, Self::ResourceExhausted { .. })
    }
}
