//! Application layer for the Licita Match engine.
//!
//! Contains the use cases that orchestrate `licita-domain`'s port traits:
//! unified search (C4), embedding generation (C5), synonym expansion
//! (C6), matching (C7), document ingestion (C8→C9→C5→C10), retrieval &
//! answering (C11), and dedup bookkeeping (C14). No concrete provider
//! lives here — `licita-infrastructure` supplies those at bootstrap and
//! wires them into [`facade::CoreFacade`].
//!
//! This crate has no dependency on `licita-providers`, by design: a
//! circular `providers -> application` dependency would be needed for
//! providers to call back into use cases, which nothing here requires.

pub mod services;
pub mod use_cases;

pub use use_cases::facade::CoreFacade;
