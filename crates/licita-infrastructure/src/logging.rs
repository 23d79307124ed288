//! Tracing setup (spec §2 ambient stack): a single process-wide
//! subscriber with env-filter-controlled verbosity and an optional JSON
//! formatter for production deployments, rather than the teacher's
//! `OperationLogger`-port-forwarding/event-bus layer — `licita-domain` has
//! no equivalent logging port, and nothing in the spec calls for an SSE
//! log stream.

use tracing_subscriber::{fmt, EnvFilter};

/// Output format for the root subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, for local development.
    Pretty,
    /// One JSON object per line, for log aggregation in production.
    Json,
}

/// Initializes the global tracing subscriber. Call once, at process
/// startup, before any other `licita_*` code runs.
///
/// `RUST_LOG` controls verbosity (default `info` if unset); components
/// log structured fields (`provider`, `opportunity_id`, `company_id`)
/// rather than interpolated strings, per SPEC_FULL.md §2.
pub fn init(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = fmt().with_env_filter(filter).with_target(true);
    match format {
        LogFormat::Pretty => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }
}
