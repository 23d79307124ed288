//! Shared HTTP plumbing: a per-host concurrency limiter and the embedding
//! tier retry/backoff policy (spec §4.5, §5).
//!
//! Every outbound adapter (REST portal, scrape portal, attachment
//! downloads, embedding tiers, LLM calls) builds its `reqwest::Client`
//! through here so connection reuse and per-host caps are consistent
//! across the crate, per spec §5 "Shared resources: An HTTP
//! session/pool per adapter instance; thread-safe connection reuse."

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

/// Caps in-flight requests against one upstream to avoid triggering
/// rate limiting (spec §5: "≤ 5 for the scrape portal, ≤ 8 for the REST
/// portal").
#[derive(Clone)]
pub struct HostLimiter {
    semaphore: Arc<Semaphore>,
}

impl HostLimiter {
    #[must_use]
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Runs `f` once a permit is available, releasing it on completion.
    pub async fn run<F, Fut, T>(&self, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        let _permit = self.semaphore.acquire().await.expect("semaphore never closed");
        f().await
    }
}

/// Builds a `reqwest::Client` with sane defaults for upstream portals:
/// a connect timeout short enough to fail fast, gzip transparently
/// decoded, and connection pooling left to reqwest's default per-host
/// behavior (the explicit cap lives in [`HostLimiter`], not here, since
/// reqwest has no first-class per-host semaphore).
#[must_use]
pub fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .build()
        .expect("reqwest client configuration is static and valid")
}

/// Per-attempt timeout schedule for the primary embedding tier (spec
/// §4.5): starts at 120s, grows by 30s per attempt, up to 5 attempts.
#[must_use]
pub fn embedding_attempt_timeout(attempt: u32) -> Duration {
    Duration::from_secs(120 + 30 * u64::from(attempt))
}

/// Exponential backoff after a 429 (spec §4.5: `2^(n+2)` seconds).
#[must_use]
pub fn backoff_after_429(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << (attempt + 2).min(20))
}

/// Exponential backoff after a 5xx (spec §4.5: `2^n` seconds).
#[must_use]
pub fn backoff_after_5xx(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt.min(20))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_timeouts_grow_by_30_seconds() {
        assert_eq!(embedding_attempt_timeout(0), Duration::from_secs(120));
        assert_eq!(embedding_attempt_timeout(1), Duration::from_secs(150));
        assert_eq!(embedding_attempt_timeout(4), Duration::from_secs(240));
    }

    #[test]
    fn backoff_schedules_match_spec() {
        assert_eq!(backoff_after_429(0), Duration::from_secs(4));
        assert_eq!(backoff_after_429(1), Duration::from_secs(8));
        assert_eq!(backoff_after_5xx(0), Duration::from_secs(1));
        assert_eq!(backoff_after_5xx(3), Duration::from_secs(8));
    }
}
