//! Generic cache entry and embedding-cache entry (spec §3).

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::value_objects::Embedding;

/// A keyed byte value with an optional expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub value: Vec<u8>,
    pub created_at: NaiveDateTime,
    pub expires_at: Option<NaiveDateTime>,
    pub hit_count: u64,
}

impl CacheEntry {
    /// A cache entry is served only while `now < expires_at` (spec §3
    /// invariant). Entries without an expiry never go stale.
    #[must_use]
    pub fn is_live(&self, now: NaiveDateTime) -> bool {
        match self.expires_at {
            Some(expires_at) => now < expires_at,
            None => true,
        }
    }
}

/// One row of the permanent embedding cache, keyed by `text_hash`
/// (SHA-256 of the raw text). Never rewritten: on conflict only
/// `last_accessed_at`/`access_count` change (spec §3 invariant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingCacheEntry {
    pub text_hash: String,
    pub text_preview: String,
    pub embedding: Embedding,
    pub model_name: String,
    pub created_at: NaiveDateTime,
    pub last_accessed_at: NaiveDateTime,
    pub access_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn expires_are_respected() {
        let entry = CacheEntry {
            key: "k".to_owned(),
            value: vec![1, 2, 3],
            created_at: dt(2026, 1, 1, 0),
            expires_at: Some(dt(2026, 1, 2, 0)),
            hit_count: 0,
        };
        assert!(entry.is_live(dt(2026, 1, 1, 12)));
        assert!(!entry.is_live(dt(2026, 1, 2, 0)));
        assert!(!entry.is_live(dt(2026, 1, 3, 0)));
    }

    #[test]
    fn no_expiry_never_goes_stale() {
        let entry = CacheEntry {
            key: "k".to_owned(),
            value: vec![],
            created_at: dt(2026, 1, 1, 0),
            expires_at: None,
            hit_count: 0,
        };
        assert!(entry.is_live(dt(2099, 1, 1, 0)));
    }
}
