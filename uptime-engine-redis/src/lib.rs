//! Redis-backed `ResultCache` for `uptime-engine` (companion crate).
//!
//! Stores each result as a JSON blob under `uptime-engine:result:{check_id}`
//! with an expiry matching `CacheConfig::ttl`, so expiry is enforced
//! server-side rather than re-checked on every `get`.

#[cfg(feature = "client")]
use async_trait::async_trait;
#[cfg(feature = "client")]
use redis::AsyncCommands;
#[cfg(feature = "client")]
use uptime_engine::cache::{CacheError, ResultCache};
#[cfg(feature = "client")]
use uptime_engine::domain::CheckResult;

#[cfg(feature = "client")]
fn key_for(check_id: &str) -> String {
    format!("uptime-engine:result:{check_id}")
}

#[cfg(feature = "client")]
pub struct RedisCache {
    conn: redis::aio::ConnectionManager,
    ttl_secs: u64,
}

#[cfg(feature = "client")]
impl RedisCache {
    pub fn new(conn: redis::aio::ConnectionManager, ttl: std::time::Duration) -> Self {
        Self { conn, ttl_secs: ttl.as_secs().max(1) }
    }
}

#[cfg(feature = "client")]
#[async_trait]
impl ResultCache for RedisCache {
    async fn put(&self, result: &CheckResult) -> Result<(), CacheError> {
        let payload =
            serde_json::to_string(result).map_err(|e| CacheError::Unavailable(e.to_string()))?;
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key_for(&result.check_id), payload, self.ttl_secs)
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))
    }

    async fn get(&self, check_id: &str) -> Result<Option<CheckResult>, CacheError> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn
            .get(key_for(check_id))
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;

        match payload {
            Some(p) => serde_json::from_str(&p)
                .map(Some)
                .map_err(|e| CacheError::Unavailable(e.to_string())),
            None => Ok(None),
        }
    }
}
