//! Composition root for the Licita Match engine.
//!
//! Everything that talks to the outside world by *construction* rather
//! than by *port trait* lives here: configuration loading, logging setup,
//! sqlx-backed persistence, and the [`bootstrap`] function that wires
//! concrete providers from `licita-providers` into `licita-application`'s
//! use cases behind `licita-domain`'s ports. The `licita` CLI binary is
//! the only crate that depends on this one.

pub mod bootstrap;
pub mod config;
pub mod logging;
pub mod persistence;

pub use bootstrap::{bootstrap, AppContext};
pub use config::{ConfigLoader, LicitaConfig};
pub use logging::LogFormat;
