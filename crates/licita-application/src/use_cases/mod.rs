//! Use cases: orchestration of `licita-domain` port traits into the
//! behaviors spec.md describes per component (C4-C14). Each use case
//! depends only on ports, never on a concrete provider.

pub mod document_pipeline;
pub mod embedding_service;
pub mod facade;
pub mod matching_engine;
pub mod retrieval_engine;
pub mod synonym_service;
pub mod unified_search;
