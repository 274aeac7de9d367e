//! HTTP checker (SPEC_FULL.md S4.3).
//!
//! Grounded on the `cyclotron-fetch` worker's split between internal
//! "worker failures" and data-level "fetch failures": a transport error,
//! a non-matching status, or a failing validation rule are all represented
//! as a failing [`CheckResult`], never as an `Err` return from `execute`.

use std::time::{Duration, Instant};

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::domain::{CheckResult, Task, TaskType, ValidationError};

use super::Checker;
use async_trait::async_trait;

const ALLOWED_METHODS: &[&str] =
    &["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"];

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_method")]
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: std::collections::HashMap<String, String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default = "default_expected_status")]
    pub expected_status: u16,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_true")]
    pub follow_redirects: bool,
    #[serde(default = "default_true")]
    pub validate_ssl: bool,
    #[serde(default)]
    pub validation_rules: Vec<ValidationRule>,
}

fn default_method() -> String {
    "GET".to_string()
}
fn default_expected_status() -> u16 {
    200
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationRule {
    JsonPath { path: String, operator: JsonPathOperator, value: Option<Value> },
    Regex { pattern: String, mode: RegexMode },
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JsonPathOperator {
    Equals,
    NotEquals,
    Contains,
    NotEmpty,
    Empty,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RegexMode {
    Contains,
    NotContains,
}

impl HttpConfig {
    fn parse(config: &Value) -> Result<Self, ValidationError> {
        serde_json::from_value(config.clone())
            .map_err(|e| ValidationError::InvalidConfig(e.to_string()))
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if !ALLOWED_METHODS.contains(&self.method.to_uppercase().as_str()) {
            return Err(ValidationError::InvalidConfig(format!(
                "unsupported HTTP method: {}",
                self.method
            )));
        }
        let parsed = url::Url::parse(&self.url)
            .map_err(|e| ValidationError::InvalidConfig(format!("invalid url: {e}")))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ValidationError::InvalidConfig(format!(
                "unsupported URL scheme: {}",
                parsed.scheme()
            )));
        }
        Ok(())
    }
}

/// Walks a dotted JSON path supporting object keys and `[n]` array indices,
/// e.g. `data.items[0].status`.
fn extract_json_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        let (key, index) = match segment.find('[') {
            Some(pos) => {
                let key = &segment[..pos];
                let idx_str = segment[pos + 1..].trim_end_matches(']');
                (key, idx_str.parse::<usize>().ok())
            }
            None => (segment, None),
        };
        current = if key.is_empty() { current } else { current.get(key)? };
        if let Some(i) = index {
            current = current.get(i)?;
        }
    }
    Some(current)
}

fn eval_json_path_rule(
    body: &Value,
    path: &str,
    op: JsonPathOperator,
    expected: &Option<Value>,
) -> bool {
    let found = extract_json_path(body, path);
    match op {
        JsonPathOperator::NotEmpty => found.map(|v| !is_empty_value(v)).unwrap_or(false),
        JsonPathOperator::Empty => found.map(is_empty_value).unwrap_or(true),
        JsonPathOperator::Equals => found.is_some() && found == expected.as_ref(),
        JsonPathOperator::NotEquals => found != expected.as_ref(),
        JsonPathOperator::Contains => match (found, expected) {
            (Some(Value::String(s)), Some(Value::String(needle))) => s.contains(needle.as_str()),
            (Some(Value::Array(items)), Some(needle)) => items.contains(needle),
            _ => false,
        },
    }
}

fn is_empty_value(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// Probes an HTTP(S) endpoint, matching the observed status against
/// `expected_status` and applying every configured validation rule.
pub struct HttpChecker {
    client: reqwest::Client,
}

impl Default for HttpChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpChecker {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }

    fn client_for(&self, cfg: &HttpConfig) -> Result<reqwest::Client, reqwest::Error> {
        if cfg.follow_redirects && cfg.validate_ssl {
            return Ok(self.client.clone());
        }
        reqwest::Client::builder()
            .redirect(if cfg.follow_redirects {
                reqwest::redirect::Policy::limited(10)
            } else {
                reqwest::redirect::Policy::none()
            })
            .danger_accept_invalid_certs(!cfg.validate_ssl)
            .build()
    }
}

#[async_trait]
impl Checker for HttpChecker {
    fn task_type(&self) -> TaskType {
        TaskType::Http
    }

    fn validate_config(&self, config: &Value) -> Result<(), ValidationError> {
        HttpConfig::parse(config)?.validate()
    }

    #[tracing::instrument(skip_all, fields(check_id = %task.check_id, execution_id = %task.execution_id))]
    async fn execute(&self, task: &Task) -> CheckResult {
        let start = Instant::now();
        let now = chrono::Utc::now();

        let cfg = match HttpConfig::parse(&task.config).and_then(|c| {
            c.validate()?;
            Ok(c)
        }) {
            Ok(cfg) => cfg,
            Err(e) => return failure(task, start, now, 0, e.to_string()),
        };

        let client = match self.client_for(&cfg) {
            Ok(c) => c,
            Err(e) => return failure(task, start, now, 0, e.to_string()),
        };

        let method = match cfg.method.to_uppercase().parse::<http::Method>() {
            Ok(m) => m,
            Err(e) => return failure(task, start, now, 0, e.to_string()),
        };

        let mut request = client.request(method.clone(), &cfg.url);
        for (k, v) in &cfg.headers {
            request = request.header(k, v);
        }
        if matches!(method, http::Method::POST | http::Method::PUT | http::Method::PATCH) {
            if let Some(body) = &cfg.body {
                request = request.body(body.clone());
            }
        }

        let timeout = Duration::from_secs(cfg.timeout_secs);
        let response = match tokio::time::timeout(timeout, request.send()).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => return failure(task, start, now, 0, format!("request failed: {e}")),
            Err(_) => return failure(task, start, now, 0, "request timed out".to_string()),
        };

        let status = response.status();
        let content_type =
            response.headers().get(reqwest::header::CONTENT_TYPE).cloned();
        let body_text = match tokio::time::timeout(timeout, response.text()).await {
            Ok(Ok(t)) => t,
            Ok(Err(e)) => return failure(task, start, now, status.as_u16() as i32, format!("failed to read body: {e}")),
            Err(_) => return failure(task, start, now, status.as_u16() as i32, "timed out reading body".to_string()),
        };

        if status.as_u16() != cfg.expected_status {
            return failure(
                task,
                start,
                now,
                status.as_u16() as i32,
                format!("expected status {}, got {}", cfg.expected_status, status.as_u16()),
            );
        }

        if !cfg.validation_rules.is_empty() {
            let body_json: Option<Value> = serde_json::from_str(&body_text).ok();
            for rule in &cfg.validation_rules {
                let ok = match rule {
                    ValidationRule::JsonPath { path, operator, value } => match &body_json {
                        Some(json) => eval_json_path_rule(json, path, *operator, value),
                        None => false,
                    },
                    ValidationRule::Regex { pattern, mode } => {
                        match Regex::new(pattern) {
                            Ok(re) => {
                                let has = re.is_match(&body_text);
                                match mode {
                                    RegexMode::Contains => has,
                                    RegexMode::NotContains => !has,
                                }
                            }
                            Err(e) => {
                                return failure(
                                    task,
                                    start,
                                    now,
                                    status.as_u16() as i32,
                                    format!("invalid regex: {e}"),
                                )
                            }
                        }
                    }
                };
                if !ok {
                    return failure(
                        task,
                        start,
                        now,
                        status.as_u16() as i32,
                        "validation rule failed".to_string(),
                    );
                }
            }
        }

        let mut metadata = std::collections::HashMap::new();
        metadata.insert("body_size".to_string(), body_text.len().to_string());
        if let Some(ct) = content_type {
            if let Ok(s) = ct.to_str() {
                metadata.insert("content_type".to_string(), s.to_string());
            }
        }

        CheckResult {
            check_id: task.check_id.clone(),
            execution_id: task.execution_id.clone(),
            success: true,
            duration_ms: start.elapsed().as_millis() as u64,
            status_code: status.as_u16() as i32,
            error: String::new(),
            response_body: truncate(&body_text),
            checked_at: now,
            metadata,
        }
    }
}

const MAX_RESPONSE_BODY: usize = 8192;

fn truncate(body: &str) -> String {
    if body.len() > MAX_RESPONSE_BODY {
        body.chars().take(MAX_RESPONSE_BODY).collect()
    } else {
        body.to_string()
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
