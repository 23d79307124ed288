//! Vector Store providers (spec C10 / §4.10): a Postgres+pgvector
//! backend for production, and an in-memory backend for local
//! development and tests (both registered so the composition root picks
//! one by configured name, same as embedding tiers and LLM providers).

mod memory;
mod pgvector;

pub use memory::InMemoryVectorStore;
pub use pgvector::PgVectorStore;
