//! TCP reachability checker (SPEC_FULL.md S4.3).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::net::TcpStream;

use crate::domain::{CheckResult, Task, TaskType, ValidationError};

use super::Checker;

#[derive(Debug, Clone, Deserialize)]
pub struct TcpConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    5
}

impl TcpConfig {
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
}

#[derive(Default)]
pub struct TcpChecker;

impl TcpChecker {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Checker for TcpChecker {
    fn task_type(&self) -> TaskType {
        TaskType::Tcp
    }

    fn validate_config(&self, config: &Value) -> Result<(), ValidationError> {
        TcpConfig::parse(config).map(|_| ())
    }

    #[tracing::instrument(skip_all, fields(check_id = %task.check_id, execution_id = %task.execution_id))]
    async fn execute(&self, task: &Task) -> CheckResult {
        let start = Instant::now();
        let now = chrono::Utc::now();

        let cfg = match TcpConfig::parse(&task.config) {
            Ok(cfg) => cfg,
            Err(e) => return failure(task, start, now, e.to_string()),
        };

        let addr = format!("{}:{}", cfg.host, cfg.port);
        let timeout = Duration::from_secs(cfg.timeout_secs);

        let mut metadata = std::collections::HashMap::new();

        match tokio::time::timeout(timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => {
                if let Ok(local) = stream.local_addr() {
                    metadata.insert("local_addr".to_string(), local.to_string());
                }
                if let Ok(remote) = stream.peer_addr() {
                    metadata.insert("remote_addr".to_string(), remote.to_string());
                }
                CheckResult {
                    check_id: task.check_id.clone(),
                    execution_id: task.execution_id.clone(),
                    success: true,
                    duration_ms: start.elapsed().as_millis() as u64,
                    status_code: 0,
                    error: String::new(),
                    response_body: String::new(),
                    checked_at: now,
                    metadata,
                }
            }
            Ok(Err(e)) => failure(task, start, now, format!("connection failed: {e}")),
            Err(_) => failure(task, start, now, "connection timed out".to_string()),
        }
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
