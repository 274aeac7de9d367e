//! GraphQL checker (SPEC_FULL.md S4.3).
//!
//! POSTs a `{query, variables?, operationName?}` envelope; success requires
//! a decodable GraphQL response whose `errors` array is empty or absent.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::domain::{CheckResult, Task, TaskType, ValidationError};

use super::Checker;

#[derive(Debug, Clone, Deserialize)]
pub struct GraphqlConfig {
    pub url: String,
    pub query: String,
    #[serde(default)]
    pub variables: Value,
    #[serde(default)]
    pub operation_name: Option<String>,
    #[serde(default)]
    pub headers: std::collections::HashMap<String, String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

impl GraphqlConfig {
    fn parse(config: &Value) -> Result<Self, ValidationError> {
        let cfg: Self = serde_json::from_value(config.clone())
            .map_err(|e| ValidationError::InvalidConfig(e.to_string()))?;
        if cfg.query.is_empty() {
            return Err(ValidationError::InvalidConfig("query is required".to_string()));
        }
        url::Url::parse(&cfg.url)
            .map_err(|e| ValidationError::InvalidConfig(format!("invalid url: {e}")))?;
        Ok(cfg)
    }
}

#[derive(Default)]
pub struct GraphqlChecker {
    client: reqwest::Client,
}

impl GraphqlChecker {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

#[async_trait]
impl Checker for GraphqlChecker {
    fn task_type(&self) -> TaskType {
        TaskType::Graphql
    }

    fn validate_config(&self, config: &Value) -> Result<(), ValidationError> {
        GraphqlConfig::parse(config).map(|_| ())
    }

    #[tracing::instrument(skip_all, fields(check_id = %task.check_id, execution_id = %task.execution_id))]
    async fn execute(&self, task: &Task) -> CheckResult {
        let start = Instant::now();
        let now = chrono::Utc::now();

        let cfg = match GraphqlConfig::parse(&task.config) {
            Ok(cfg) => cfg,
            Err(e) => return failure(task, start, now, 0, e.to_string()),
        };

        let mut envelope = serde_json::json!({ "query": cfg.query });
        if !cfg.variables.is_null() {
            envelope["variables"] = cfg.variables.clone();
        }
        if let Some(op) = &cfg.operation_name {
            envelope["operationName"] = Value::String(op.clone());
        }

        let mut request = self
            .client
            .post(&cfg.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(&envelope);
        for (k, v) in &cfg.headers {
            request = request.header(k, v);
        }

        let timeout = Duration::from_secs(cfg.timeout_secs);
        let response = match tokio::time::timeout(timeout, request.send()).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => return failure(task, start, now, 0, format!("request failed: {e}")),
            Err(_) => return failure(task, start, now, 0, "request timed out".to_string()),
        };
        let status = response.status();

        let body: Value = match tokio::time::timeout(timeout, response.json()).await {
            Ok(Ok(b)) => b,
            Ok(Err(e)) => {
                return failure(
                    task,
                    start,
                    now,
                    status.as_u16() as i32,
                    format!("response was not valid GraphQL JSON: {e}"),
                )
            }
            Err(_) => return failure(task, start, now, status.as_u16() as i32, "timed out reading response".to_string()),
        };

        let errors_present = body
            .get("errors")
            .map(|e| matches!(e, Value::Array(a) if !a.is_empty()))
            .unwrap_or(false);

        if errors_present {
            let message = body["errors"][0]["message"].as_str().unwrap_or("graphql error").to_string();
            return failure(task, start, now, status.as_u16() as i32, message);
        }

        if !status.is_success() {
            return failure(
                task,
                start,
                now,
                status.as_u16() as i32,
                format!("non-2xx response without decodable errors: {status}"),
            );
        }

        CheckResult {
            check_id: task.check_id.clone(),
            execution_id: task.execution_id.clone(),
            success: true,
            duration_ms: start.elapsed().as_millis() as u64,
            status_code: status.as_u16() as i32,
            error: String::new(),
            response_body: body.to_string(),
            checked_at: now,
            metadata: std::collections::HashMap::new(),
        }
    }
}

fn failure(
    task: &Task,
    start: Instant,
    now: chrono::DateTime<chrono::Utc>,
    status_code: i32,
    error: String,
) -> CheckResult {
    CheckResult {
        check_id: task.check_id.clone(),
        execution_id: task.execution_id.clone(),
        success: false,
        duration_ms: start.elapsed().as_millis() as u64,
        status_code,
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
    fn rejects_empty_query() {
        let checker = GraphqlChecker::new();
        let config = serde_json::json!({"url": "https://example.test/graphql", "query": ""});
        assert!(checker.validate_config(&config).is_err());
    }

    #[test]
    fn rejects_invalid_url() {
        let checker = GraphqlChecker::new();
        let config = serde_json::json!({"url": "not a url", "query": "{ ping }"});
        assert!(checker.validate_config(&config).is_err());
    }

    #[test]
    fn accepts_well_formed_config() {
        let checker = GraphqlChecker::new();
        let config =
            serde_json::json!({"url": "https://example.test/graphql", "query": "{ ping }"});
        assert!(checker.validate_config(&config).is_ok());
    }
}
