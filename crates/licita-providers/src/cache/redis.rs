//! External KV cache provider (spec C12), backed by `redis`. Used when
//! multiple instances need to share cached national-dataset snapshots
//! and embedding results (spec §4.12: "shared across instances").

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use licita_domain::error::{Error, Result};
use licita_domain::ports::cache::CacheProvider;

pub struct RedisCacheProvider {
    connection: ConnectionManager,
}

impl RedisCacheProvider {
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `dsn` doesn't parse as a redis
    /// URL, or [`Error::upstream_transient`] if the initial connection
    /// fails (the caller may retry; a missing cache degrades latency
    /// only, per spec §7).
    pub async fn connect(dsn: &str) -> Result<Self> {
        let client = redis::Client::open(dsn).map_err(|e| Error::config(format!("invalid redis dsn: {e}")))?;
        let connection = client
            .get_connection_manager()
            .await
            .map_err(|e| Error::upstream_transient("redis", e.to_string()))?;
        Ok(Self { connection })
    }
}

#[async_trait]
impl CacheProvider for RedisCacheProvider {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.connection.clone();
        conn.get(key).await.map_err(|e| Error::upstream_transient("redis", e.to_string()))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl_seconds: Option<u64>) -> Result<()> {
        let mut conn = self.connection.clone();
        match ttl_seconds {
            Some(ttl) => conn
                .set_ex::<_, _, ()>(key, value, ttl)
                .await
                .map_err(|e| Error::upstream_transient("redis", e.to_string())),
            None => conn
                .set::<_, _, ()>(key, value)
                .await
                .map_err(|e| Error::upstream_transient("redis", e.to_string())),
        }
    }

    async fn scan(&self, prefix: &str) -> Result<Vec<String>> {
        let mut conn = self.connection.clone();
        let pattern = format!("{prefix}*");
        conn.keys(pattern).await.map_err(|e| Error::upstream_transient("redis", e.to_string()))
    }

    async fn invalidate(&self, key: &str) -> Result<()> {
        let mut conn = self.connection.clone();
        conn.del::<_, ()>(key).await.map_err(|e| Error::upstream_transient("redis", e.to_string()))
    }
}
