//! Incident client (SPEC_FULL.md S4.5).
//!
//! Reports failing/recovering checks to the incident backend over RPC,
//! retrying transient failures with the same backoff-and-jitter shape as
//! the worker pool, and deduplicating via a content fingerprint so a check
//! that keeps failing the same way doesn't open a new incident per attempt.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::RetryConfig;
use crate::domain::{severity_for, CheckResult, Severity};
use crate::jitter::Jitter;
use crate::sleeper::{Sleeper, TokioSleeper};

#[derive(Debug, Error, Clone)]
pub enum IncidentError {
    #[error("incident backend unavailable: {0}")]
    Unavailable(String),

    #[error("incident backend rejected request: {0}")]
    Rejected(String),

    #[error("retries exhausted after {attempts} attempts, last error: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

/// Fingerprint used to deduplicate incidents for the same check failing the
/// same way: first 16 hex chars of `sha256(check_id + ":" + error_message)`.
pub fn fingerprint(check_id: &str, error_message: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(check_id.as_bytes());
    hasher.update(b":");
    hasher.update(error_message.as_bytes());
    let digest = hasher.finalize();
    digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
}

#[async_trait]
pub trait IncidentClient: Send + Sync {
    /// Reports a failed check, opening or updating an incident. Returns the
    /// incident id assigned by the backend.
    async fn report_failure(
        &self,
        result: &CheckResult,
        severity: Severity,
    ) -> Result<String, IncidentError>;

    /// Reports a recovered check, resolving any open incident for it.
    async fn report_recovery(&self, result: &CheckResult) -> Result<(), IncidentError>;
}

/// Wraps an `IncidentClient` transport with the spec's retry policy
/// (SPEC_FULL.md S4.5): exponential backoff with symmetric jitter, bounded
/// by `RetryConfig::max_retries`.
pub struct RetryingIncidentClient<T> {
    inner: T,
    retry: RetryConfig,
    sleeper: Arc<dyn Sleeper>,
}

impl<T> RetryingIncidentClient<T> {
    pub fn new(inner: T, retry: RetryConfig) -> Self {
        Self { inner, retry, sleeper: Arc::new(TokioSleeper) }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }
}

#[async_trait]
impl<T> IncidentClient for RetryingIncidentClient<T>
where
    T: IncidentClient,
{
    async fn report_failure(
        &self,
        result: &CheckResult,
        severity: Severity,
    ) -> Result<String, IncidentError> {
        self.retrying(|| self.inner.report_failure(result, severity)).await
    }

    async fn report_recovery(&self, result: &CheckResult) -> Result<(), IncidentError> {
        self.retrying(|| self.inner.report_recovery(result)).await
    }
}

impl<T> RetryingIncidentClient<T> {
    async fn retrying<F, Fut, R>(&self, mut op: F) -> Result<R, IncidentError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<R, IncidentError>>,
    {
        let jitter = Jitter::symmetric(self.retry.jitter);
        let mut last_error = String::new();

        for attempt in 0..=self.retry.max_retries {
            match op().await {
                Ok(value) => return Ok(value),
                Err(IncidentError::Rejected(msg)) => return Err(IncidentError::Rejected(msg)),
                Err(e) => {
                    last_error = e.to_string();
                    if attempt == self.retry.max_retries {
                        break;
                    }
                    let delay = jitter.apply(self.retry.base_delay(attempt));
                    self.sleeper.sleep(delay).await;
                }
            }
        }

        Err(IncidentError::RetriesExhausted { attempts: self.retry.max_retries + 1, last_error })
    }
}

/// In-memory `IncidentClient` for tests and the demo wiring. Deduplicates
/// by fingerprint: reporting the same failure twice returns the same
/// incident id instead of opening a second one.
#[derive(Default)]
pub struct MemoryIncidentClient {
    open: std::sync::Mutex<std::collections::HashMap<String, (String, String)>>,
}

impl MemoryIncidentClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_incident_ids(&self) -> Vec<String> {
        self.open.lock().unwrap().values().map(|(_, id)| id.clone()).collect()
    }
}

#[async_trait]
impl IncidentClient for MemoryIncidentClient {
    async fn report_failure(
        &self,
        result: &CheckResult,
        _severity: Severity,
    ) -> Result<String, IncidentError> {
        let fp = fingerprint(&result.check_id, &result.error);
        let mut open = self.open.lock().unwrap();
        if let Some((_, id)) = open.get(&fp) {
            return Ok(id.clone());
        }
        let id = format!("inc-{fp}");
        open.insert(fp, (result.check_id.clone(), id.clone()));
        Ok(id)
    }

    async fn report_recovery(&self, result: &CheckResult) -> Result<(), IncidentError> {
        let mut open = self.open.lock().unwrap();
        open.retain(|_, (check_id, _)| check_id != &result.check_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failing_result(check_id: &str, error: &str) -> CheckResult {
        CheckResult {
            check_id: check_id.to_string(),
            execution_id: "e1".to_string(),
            success: false,
            duration_ms: 5,
            status_code: 500,
            error: error.to_string(),
            response_body: String::new(),
            checked_at: chrono::Utc::now(),
            metadata: Default::default(),
        }
    }

    #[test]
    fn fingerprint_is_deterministic() {
        assert_eq!(fingerprint("c1", "boom"), fingerprint("c1", "boom"));
        assert_ne!(fingerprint("c1", "boom"), fingerprint("c1", "bang"));
        assert_eq!(fingerprint("c1", "boom").len(), 16);
    }

    #[tokio::test]
    async fn duplicate_failures_share_one_incident() {
        let client = MemoryIncidentClient::new();
        let result = failing_result("c1", "connection refused");
        let first = client.report_failure(&result, Severity::Critical).await.unwrap();
        let second = client.report_failure(&result, Severity::Critical).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn distinct_errors_open_distinct_incidents() {
        let client = MemoryIncidentClient::new();
        let a = client.report_failure(&failing_result("c1", "timeout"), Severity::Error).await.unwrap();
        let b = client.report_failure(&failing_result("c1", "refused"), Severity::Error).await.unwrap();
        assert_ne!(a, b);
    }

    struct FlakyClient {
        fail_times: std::sync::atomic::AtomicU32,
    }

    #[async_trait]
    impl IncidentClient for FlakyClient {
        async fn report_failure(
            &self,
            _result: &CheckResult,
            _severity: Severity,
        ) -> Result<String, IncidentError> {
            let remaining = self.fail_times.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
            if remaining > 0 {
                Err(IncidentError::Unavailable("connection reset".to_string()))
            } else {
                Ok("inc-1".to_string())
            }
        }

        async fn report_recovery(&self, _result: &CheckResult) -> Result<(), IncidentError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn retries_until_success_within_budget() {
        let inner = FlakyClient { fail_times: std::sync::atomic::AtomicU32::new(2) };
        let retry = RetryConfig {
            max_retries: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            multiplier: 2.0,
            jitter: 0.0,
        };
        let client = RetryingIncidentClient::new(inner, retry)
            .with_sleeper(Arc::new(crate::sleeper::InstantSleeper));
        let id = client.report_failure(&failing_result("c1", "x"), Severity::Error).await.unwrap();
        assert_eq!(id, "inc-1");
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let inner = FlakyClient { fail_times: std::sync::atomic::AtomicU32::new(100) };
        let retry = RetryConfig {
            max_retries: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            multiplier: 2.0,
            jitter: 0.0,
        };
        let client = RetryingIncidentClient::new(inner, retry)
            .with_sleeper(Arc::new(crate::sleeper::InstantSleeper));
        let err = client.report_failure(&failing_result("c1", "x"), Severity::Error).await.unwrap_err();
        assert!(matches!(err, IncidentError::RetriesExhausted { attempts: 3, .. }));
    }
}
