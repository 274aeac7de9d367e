//! Check service: the orchestrator tying decode, validation, dispatch, and
//! downstream persistence/alerting together (SPEC_FULL.md S4.2).
//!
//! `decode_task` turns a raw queue payload into a validated [`Task`] (a
//! malformed payload is a permanent failure, never retried); the worker
//! pool then dispatches the task and produces a [`CheckResult`]; `process_result`
//! stamps `processed_at`/`service` metadata onto the result and fans it out
//! to the repository, cache, and incident client through the same
//! [`ResultSink`] contract, so a sink outage never fails the pipeline
//! (S8 property 5).

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::cache::ResultCache;
use crate::domain::{severity_for, CheckResult, Task, ValidationError};
use crate::incident::IncidentClient;
use crate::repository::ResultRepository;
use crate::sink::{emit_best_effort, MulticastSink, ResultSink, SinkError};

#[derive(Debug, Error)]
pub enum CheckServiceError {
    #[error("malformed task payload: {0}")]
    Decode(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Decodes and validates a raw queue payload into a [`Task`]. Callers treat
/// any error here as permanent (nack without requeue): the message will
/// never become processable by retrying it as-is (SPEC_FULL.md S8 scenario 3).
pub fn decode_task(raw: &[u8]) -> Result<Task, CheckServiceError> {
    let task: Task =
        serde_json::from_slice(raw).map_err(|e| CheckServiceError::Decode(e.to_string()))?;
    task.validate()?;
    Ok(task)
}

/// Adapts a [`ResultRepository`] to [`ResultSink`]: every result, success or
/// failure, is durably recorded.
pub struct RepositorySink(pub Arc<dyn ResultRepository>);

#[async_trait]
impl ResultSink for RepositorySink {
    async fn emit(&self, result: &CheckResult) -> Result<(), SinkError> {
        self.0
            .store(result)
            .await
            .map_err(|e| SinkError::Unavailable(e.to_string()))
    }

    fn name(&self) -> &str {
        "repository"
    }
}

/// Adapts a [`ResultCache`] to [`ResultSink`]: keeps the "current status"
/// view fresh.
pub struct CacheSink(pub Arc<dyn ResultCache>);

#[async_trait]
impl ResultSink for CacheSink {
    async fn emit(&self, result: &CheckResult) -> Result<(), SinkError> {
        self.0
            .put(result)
            .await
            .map_err(|e| SinkError::Unavailable(e.to_string()))
    }

    fn name(&self) -> &str {
        "cache"
    }
}

/// Adapts an [`IncidentClient`] to [`ResultSink`]: opens/dedupes incidents
/// on failure, resolves them on recovery (SPEC_FULL.md S4.5).
pub struct IncidentSink(pub Arc<dyn IncidentClient>);

#[async_trait]
impl ResultSink for IncidentSink {
    async fn emit(&self, result: &CheckResult) -> Result<(), SinkError> {
        if result.success {
            self.0
                .report_recovery(result)
                .await
                .map_err(|e| SinkError::Rejected(e.to_string()))
        } else {
            let severity = severity_for(result.success, result.status_code);
            self.0
                .report_failure(result, severity)
                .await
                .map(|_incident_id| ())
                .map_err(|e| SinkError::Rejected(e.to_string()))
        }
    }

    fn name(&self) -> &str {
        "incident"
    }
}

/// Wires the repository, cache, and incident client into one best-effort
/// fan-out, plus any extra sinks a deployment wants (metrics exporters,
/// webhooks, ...).
pub struct CheckService {
    sink: MulticastSink,
}

impl CheckService {
    pub fn new(
        repository: Arc<dyn ResultRepository>,
        cache: Arc<dyn ResultCache>,
        incident_client: Arc<dyn IncidentClient>,
        extra_sinks: Vec<Arc<dyn ResultSink>>,
    ) -> Self {
        let mut sinks: Vec<Arc<dyn ResultSink>> = vec![
            Arc::new(RepositorySink(repository)),
            Arc::new(CacheSink(cache)),
            Arc::new(IncidentSink(incident_client)),
        ];
        sinks.extend(extra_sinks);
        Self { sink: MulticastSink::new(sinks) }
    }

    /// Stamps `processed_at`/`service` metadata (SPEC_FULL.md S4.2) and fans
    /// the result out to every configured sink, best-effort. Never returns
    /// an error: per S8 property 5, a sink outage must not fail the
    /// pipeline or cause the delivery to be nacked.
    pub async fn process_result(&self, mut result: CheckResult) {
        result.metadata.insert("processed_at".to_string(), chrono::Utc::now().to_rfc3339());
        result.metadata.insert("service".to_string(), "uptime-engine".to_string());
        emit_best_effort(&self.sink, &result).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::domain::TaskType;
    use crate::incident::MemoryIncidentClient;
    use crate::repository::MemoryRepository;

    fn raw_task(check_id: &str) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "check_id": check_id,
            "execution_id": "e1",
            "target": "https://example.test",
            "type": "http",
            "config": {},
            "scheduled_at": chrono::Utc::now().to_rfc3339(),
        }))
        .unwrap()
    }

    #[test]
    fn decodes_well_formed_payload() {
        let task = decode_task(&raw_task("c1")).unwrap();
        assert_eq!(task.check_id, "c1");
        assert_eq!(task.task_type, TaskType::Http);
    }

    #[test]
    fn rejects_malformed_json() {
        let err = decode_task(b"not json").unwrap_err();
        assert!(matches!(err, CheckServiceError::Decode(_)));
    }

    #[test]
    fn rejects_missing_required_field() {
        let raw = serde_json::to_vec(&serde_json::json!({
            "execution_id": "e1",
            "target": "t",
            "type": "http",
            "scheduled_at": chrono::Utc::now().to_rfc3339(),
        }))
        .unwrap();
        assert!(decode_task(&raw).is_err());
    }

    fn sample_result(check_id: &str, success: bool) -> CheckResult {
        CheckResult {
            check_id: check_id.to_string(),
            execution_id: "e1".to_string(),
            success,
            duration_ms: 5,
            status_code: if success { 200 } else { 500 },
            error: if success { String::new() } else { "boom".to_string() },
            response_body: String::new(),
            checked_at: chrono::Utc::now(),
            metadata: Default::default(),
        }
    }

    #[tokio::test]
    async fn successful_result_reaches_repository_and_cache() {
        let repository = Arc::new(MemoryRepository::new());
        let cache = Arc::new(MemoryCache::default());
        let incident = Arc::new(MemoryIncidentClient::new());
        let service = CheckService::new(repository.clone(), cache.clone(), incident, vec![]);

        service.process_result(sample_result("c1", true)).await;

        assert!(repository.get("c1", "e1").await.is_ok());
        assert!(cache.get("c1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn failing_result_opens_an_incident() {
        let repository = Arc::new(MemoryRepository::new());
        let cache = Arc::new(MemoryCache::default());
        let incident = Arc::new(MemoryIncidentClient::new());
        let service = CheckService::new(repository, cache, incident.clone(), vec![]);

        service.process_result(sample_result("c1", false)).await;

        assert_eq!(incident.open_incident_ids().len(), 1);
    }

    #[tokio::test]
    async fn recovery_closes_the_open_incident() {
        let repository = Arc::new(MemoryRepository::new());
        let cache = Arc::new(MemoryCache::default());
        let incident = Arc::new(MemoryIncidentClient::new());
        let service = CheckService::new(repository, cache, incident.clone(), vec![]);

        service.process_result(sample_result("c1", false)).await;
        assert_eq!(incident.open_incident_ids().len(), 1);

        service.process_result(sample_result("c1", true)).await;
        assert_eq!(incident.open_incident_ids().len(), 0);
    }
}
