//! Cache Layer providers (spec C12 / §4.12): an in-process `moka` cache
//! for single-instance deployments, and a `redis`-backed cache for
//! sharing across instances. Neither is `linkme`-registered — the
//! composition root picks one directly from configuration, since a
//! cache has no provider-name the rest of the system ever selects by
//! (unlike embedding tiers or LLM providers, which are swappable
//! per-call-site).

mod moka;
mod redis;

pub use moka::MokaCacheProvider;
pub use redis::RedisCacheProvider;
