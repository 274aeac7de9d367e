//! Result repository (SPEC_FULL.md S4.6).
//!
//! Durable storage for `CheckResult`s. The core crate only defines the
//! contract; `uptime-engine-postgres` provides the sqlx-backed
//! implementation used in production.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::CheckResult;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("write rejected: {0}")]
    Rejected(String),

    #[error("result not found for check_id={check_id} execution_id={execution_id}")]
    NotFound { check_id: String, execution_id: String },
}

#[async_trait]
pub trait ResultRepository: Send + Sync {
    async fn store(&self, result: &CheckResult) -> Result<(), RepositoryError>;

    async fn get(
        &self,
        check_id: &str,
        execution_id: &str,
    ) -> Result<CheckResult, RepositoryError>;

    /// Most recent results for a check, newest first, capped at `limit`.
    async fn recent(&self, check_id: &str, limit: usize) -> Result<Vec<CheckResult>, RepositoryError>;
}

/// In-memory `ResultRepository` for tests and the demo wiring. Keeps every
/// result ever stored, ordered by insertion.
#[derive(Default)]
pub struct MemoryRepository {
    results: std::sync::Mutex<Vec<CheckResult>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResultRepository for MemoryRepository {
    async fn store(&self, result: &CheckResult) -> Result<(), RepositoryError> {
        self.results.lock().unwrap().push(result.clone());
        Ok(())
    }

    async fn get(
        &self,
        check_id: &str,
        execution_id: &str,
    ) -> Result<CheckResult, RepositoryError> {
        self.results
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|r| r.check_id == check_id && r.execution_id == execution_id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound {
                check_id: check_id.to_string(),
                execution_id: execution_id.to_string(),
            })
    }

    async fn recent(&self, check_id: &str, limit: usize) -> Result<Vec<CheckResult>, RepositoryError> {
        let results = self.results.lock().unwrap();
        Ok(results
            .iter()
            .rev()
            .filter(|r| r.check_id == check_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(check_id: &str, execution_id: &str) -> CheckResult {
        CheckResult {
            check_id: check_id.to_string(),
            execution_id: execution_id.to_string(),
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
    async fn stores_and_retrieves_by_ids() {
        let repo = MemoryRepository::new();
        repo.store(&result("c1", "e1")).await.unwrap();
        let got = repo.get("c1", "e1").await.unwrap();
        assert_eq!(got.execution_id, "e1");
    }

    #[tokio::test]
    async fn missing_result_is_not_found() {
        let repo = MemoryRepository::new();
        assert!(matches!(repo.get("c1", "e1").await, Err(RepositoryError::NotFound { .. })));
    }

    #[tokio::test]
    async fn recent_returns_newest_first_capped_at_limit() {
        let repo = MemoryRepository::new();
        for i in 0..5 {
            repo.store(&result("c1", &format!("e{i}"))).await.unwrap();
        }
        let recent = repo.recent("c1", 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].execution_id, "e4");
        assert_eq!(recent[1].execution_id, "e3");
    }
}
