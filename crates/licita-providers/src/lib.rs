//! Concrete provider adapters implementing `licita-domain`'s port traits.
//!
//! Nothing in `licita-application` depends on this crate; the composition
//! root in `licita-infrastructure` constructs these providers and wires
//! them into the use cases behind `dyn Trait` objects. Each provider
//! module additionally registers itself into the relevant `linkme`
//! registry (mapper, embedding tier, vector store, LLM) so new providers
//! are added purely by writing a new module, never by editing a
//! `match`/`if` chain elsewhere (spec §9).

pub mod attachments;
pub mod cache;
pub mod dedup;
pub mod embedding;
pub mod extraction;
pub mod llm;
pub mod mappers;
pub mod providers;
pub mod storage;
pub mod vector_store;

pub mod http;
