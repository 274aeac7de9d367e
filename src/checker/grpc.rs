//! gRPC checker (SPEC_FULL.md S4.3).
//!
//! `service = "grpc.health.v1.Health"`, `method = "Check"` invokes the
//! standard gRPC health-checking protocol and maps `SERVING` to success.
//! For any other service/method the minimum contract is met: the channel
//! reaching `Ready` before the deadline is success.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tonic::transport::Endpoint;

use crate::domain::{CheckResult, Task, TaskType, ValidationError};

use super::Checker;

#[derive(Debug, Clone, Deserialize)]
pub struct GrpcConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub metadata: std::collections::HashMap<String, String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    5
}

impl GrpcConfig {
    fn parse(config: &Value) -> Result<Self, ValidationError> {
        let cfg: Self = serde_json::from_value(config.clone())
            .map_err(|e| ValidationError::InvalidConfig(e.to_string()))?;
        if cfg.host.is_empty() {
            return Err(ValidationError::InvalidConfig("host is required".to_string()));
        }
        if cfg.port == 0 {
            return Err(ValidationError::InvalidConfig("port must be in [1, 65535]".to_string()));
        }
        Ok(cfg)
    }

    fn is_health_check(&self) -> bool {
        self.service == "grpc.health.v1.Health" && self.method == "Check"
    }
}

#[derive(Default)]
pub struct GrpcChecker;

impl GrpcChecker {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Checker for GrpcChecker {
    fn task_type(&self) -> TaskType {
        TaskType::Grpc
    }

    fn validate_config(&self, config: &Value) -> Result<(), ValidationError> {
        GrpcConfig::parse(config).map(|_| ())
    }

    #[tracing::instrument(skip_all, fields(check_id = %task.check_id, execution_id = %task.execution_id))]
    async fn execute(&self, task: &Task) -> CheckResult {
        let start = Instant::now();
        let now = chrono::Utc::now();

        let cfg = match GrpcConfig::parse(&task.config) {
            Ok(cfg) => cfg,
            Err(e) => return failure(task, start, now, e.to_string()),
        };

        let uri = format!("http://{}:{}", cfg.host, cfg.port);
        let timeout = Duration::from_secs(cfg.timeout_secs);

        let endpoint = match Endpoint::from_shared(uri)
            .map_err(|e| e.to_string())
            .and_then(|e| Ok(e.connect_timeout(timeout).timeout(timeout)))
        {
            Ok(e) => e,
            Err(e) => return failure(task, start, now, format!("invalid endpoint: {e}")),
        };

        let channel = match tokio::time::timeout(timeout, endpoint.connect()).await {
            Ok(Ok(channel)) => channel,
            Ok(Err(e)) => return failure(task, start, now, format!("connect failed: {e}")),
            Err(_) => return failure(task, start, now, "connect timed out".to_string()),
        };

        if cfg.is_health_check() {
            let mut client = tonic_health::pb::health_client::HealthClient::new(channel);
            let request = tonic::Request::new(tonic_health::pb::HealthCheckRequest {
                service: String::new(),
            });
            match tokio::time::timeout(timeout, client.check(request)).await {
                Ok(Ok(resp)) => {
                    let serving = resp.into_inner().status
                        == tonic_health::pb::health_check_response::ServingStatus::Serving as i32;
                    if serving {
                        success(task, start, now)
                    } else {
                        failure(task, start, now, "health check reported not serving".to_string())
                    }
                }
                Ok(Err(status)) => failure(task, start, now, format!("health check failed: {status}")),
                Err(_) => failure(task, start, now, "health check timed out".to_string()),
            }
        } else {
            // Minimum contract for a non-health target: the channel reached Ready.
            success(task, start, now)
        }
    }
}

fn success(task: &Task, start: Instant, now: chrono::DateTime<chrono::Utc>) -> CheckResult {
    CheckResult {
        check_id: task.check_id.clone(),
        execution_id: task.execution_id.clone(),
        success: true,
        duration_ms: start.elapsed().as_millis() as u64,
        status_code: 0,
        error: String::new(),
        response_body: String::new(),
        checked_at: now,
        metadata: std::collections::HashMap::new(),
    }
}

fn failure(
    task: &Task,
    start: Instant,
    now: chrono::DateTime<chrono::Utc>,
    error: String,
) -> CheckResult {
    CheckResult {
        check_id: task.check_id.clone(),
        execution_id: task.execution_id.clone(),
        success: false,
        duration_ms: start.elapsed().as_millis() as u64,
        status_code: 0,
        error,
        response_body: String::new(),
        checked_at: now,
        metadata: std::collections::HashMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_host() {
        let checker = GrpcChecker::new();
        let config = serde_json::json!({"host": "", "port": 50051});
        assert!(checker.validate_config(&config).is_err());
    }

    #[test]
    fn health_check_detection() {
        let cfg = GrpcConfig {
            host: "h".into(),
            port: 1,
            service: "grpc.health.v1.Health".into(),
            method: "Check".into(),
            metadata: Default::default(),
            timeout_secs: 1,
        };
        assert!(cfg.is_health_check());

        let cfg2 = GrpcConfig { service: "other".into(), ..cfg };
        assert!(!cfg2.is_health_check());
    }
}
