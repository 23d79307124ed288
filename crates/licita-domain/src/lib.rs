//! Core entities, value objects, and port traits for the Licita Match
//! engine. Everything in this crate is pure domain logic: no I/O, no
//! concrete provider, no framework dependency beyond `serde`/`chrono`
//! for data shape and `async-trait`/`linkme` for the port/registry
//! machinery itself.

pub mod constants;
pub mod entities;
pub mod error;
pub mod macros;
pub mod ports;
pub mod registry;
pub mod utils;
pub mod value_objects;

pub use error::{Error, Result};
