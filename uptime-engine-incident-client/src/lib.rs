//! HTTP/JSON RPC `IncidentClient` for `uptime-engine` (companion crate).
//!
//! Talks to a remote incident service over a small JSON RPC surface:
//! `POST {address}/v1/incidents` to open/update (the server dedupes by
//! fingerprint), `POST {address}/v1/incidents/resolve` to resolve whatever
//! is open for a check. A single `reqwest::Client` is held for the
//! connection's lifetime, matching the spec's "single long-lived
//! connection with blocking dial at construction" (the dial here is lazy —
//! reqwest pools connections on first use — but the client is constructed
//! once and shared).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uptime_engine::domain::{CheckResult, Severity};
use uptime_engine::incident::{fingerprint, IncidentClient, IncidentError};

#[derive(Debug, Clone)]
pub struct HttpIncidentClient {
    client: reqwest::Client,
    address: String,
    timeout: std::time::Duration,
}

impl HttpIncidentClient {
    pub fn new(address: impl Into<String>, timeout: std::time::Duration) -> Self {
        Self { client: reqwest::Client::new(), address: address.into(), timeout }
    }
}

#[derive(Serialize)]
struct CreateIncidentRequest<'a> {
    check_id: &'a str,
    execution_id: &'a str,
    fingerprint: String,
    severity: Severity,
    error_message: &'a str,
    status_code: i32,
}

#[derive(Deserialize)]
struct CreateIncidentResponse {
    id: String,
}

#[derive(Serialize)]
struct ResolveIncidentRequest<'a> {
    check_id: &'a str,
    fingerprint: String,
}

#[async_trait]
impl IncidentClient for HttpIncidentClient {
    async fn report_failure(
        &self,
        result: &CheckResult,
        severity: Severity,
    ) -> Result<String, IncidentError> {
        let body = CreateIncidentRequest {
            check_id: &result.check_id,
            execution_id: &result.execution_id,
            fingerprint: fingerprint(&result.check_id, &result.error),
            severity,
            error_message: &result.error,
            status_code: result.status_code,
        };

        let response = tokio::time::timeout(
            self.timeout,
            self.client.post(format!("{}/v1/incidents", self.address)).json(&body).send(),
        )
        .await
        .map_err(|_| IncidentError::Unavailable("request timed out".to_string()))?
        .map_err(|e| IncidentError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(IncidentError::Rejected(format!(
                "incident service returned {}",
                response.status()
            )));
        }

        let parsed: CreateIncidentResponse = response
            .json()
            .await
            .map_err(|e| IncidentError::Rejected(format!("malformed response: {e}")))?;
        Ok(parsed.id)
    }

    async fn report_recovery(&self, result: &CheckResult) -> Result<(), IncidentError> {
        let body = ResolveIncidentRequest {
            check_id: &result.check_id,
            fingerprint: fingerprint(&result.check_id, &result.error),
        };

        let response = tokio::time::timeout(
            self.timeout,
            self.client.post(format!("{}/v1/incidents/resolve", self.address)).json(&body).send(),
        )
        .await
        .map_err(|_| IncidentError::Unavailable("request timed out".to_string()))?
        .map_err(|e| IncidentError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(IncidentError::Rejected(format!(
                "incident service returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}
