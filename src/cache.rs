//! Result cache (SPEC_FULL.md S4.6).
//!
//! A short-lived view of the most recent result per check, used to answer
//! "what's the current status" without hitting the repository. The core
//! crate defines the contract and an in-memory reference implementation;
//! `uptime-engine-redis` provides the production-backed one.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::CheckResult;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait ResultCache: Send + Sync {
    async fn put(&self, result: &CheckResult) -> Result<(), CacheError>;

    /// Returns `None` on a miss, whether because nothing was ever cached
    /// for this check or because the cached entry expired.
    async fn get(&self, check_id: &str) -> Result<Option<CheckResult>, CacheError>;
}

struct Entry {
    result: CheckResult,
    inserted_at: Instant,
}

/// In-memory `ResultCache` with the spec's default 5-minute TTL
/// (`CacheConfig::ttl`). Expiry is checked lazily on `get`.
pub struct MemoryCache {
    ttl: Duration,
    entries: std::sync::Mutex<std::collections::HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: std::sync::Mutex::new(std::collections::HashMap::new()) }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

#[async_trait]
impl ResultCache for MemoryCache {
    async fn put(&self, result: &CheckResult) -> Result<(), CacheError> {
        self.entries.lock().unwrap().insert(
            result.check_id.clone(),
            Entry { result: result.clone(), inserted_at: Instant::now() },
        );
        Ok(())
    }

    async fn get(&self, check_id: &str) -> Result<Option<CheckResult>, CacheError> {
        let mut entries = self.entries.lock().unwrap();
        let Some(entry) = entries.get(check_id) else {
            return Ok(None);
        };
        if entry.inserted_at.elapsed() > self.ttl {
            entries.remove(check_id);
            return Ok(None);
        }
        Ok(Some(entry.result.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(check_id: &str) -> CheckResult {
        CheckResult {
            check_id: check_id.to_string(),
            execution_id: "e1".to_string(),
            success: true,
            duration_ms: 5,
            status_code: 200,
            error: String::new(),
            response_body: String::new(),
            checked_at: chrono::Utc::now(),
            metadata: Default::default(),
        }
    }

    #[tokio::test]
    async fn hits_within_ttl() {
        let cache = MemoryCache::new(Duration::from_secs(60));
        cache.put(&result("c1")).await.unwrap();
        assert!(cache.get("c1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn misses_unknown_check() {
        let cache = MemoryCache::new(Duration::from_secs(60));
        assert!(cache.get("nonexistent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expires_after_ttl() {
        let cache = MemoryCache::new(Duration::from_millis(10));
        cache.put(&result("c1")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(cache.get("c1").await.unwrap().is_none());
    }
}
