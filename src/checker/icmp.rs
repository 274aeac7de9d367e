//! ICMP reachability checker (SPEC_FULL.md S4.3, S9).
//!
//! Raw ICMP requires elevated privileges on most platforms. The default
//! build here probes a well-known TCP port instead, which needs none; a
//! real ICMP echo prober is available behind the `icmp-raw` feature. Either
//! way the contract is "reachability within timeout" — this is a deployment
//! choice, not a spec contract (S9).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::domain::{CheckResult, Task, TaskType, ValidationError};

use super::Checker;

/// Port probed by the TCP-based fallback when the configured target has no
/// other hint of what's listening.
const FALLBACK_PROBE_PORT: u16 = 443;

#[derive(Debug, Clone, Deserialize)]
pub struct IcmpConfig {
    pub target: String,
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_count() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    2
}
fn default_interval_ms() -> u64 {
    200
}

impl IcmpConfig {
    fn parse(config: &Value) -> Result<Self, ValidationError> {
        let cfg: Self = serde_json::from_value(config.clone())
            .map_err(|e| ValidationError::InvalidConfig(e.to_string()))?;
        if cfg.target.is_empty() {
            return Err(ValidationError::InvalidConfig("target is required".to_string()));
        }
        if cfg.count == 0 {
            return Err(ValidationError::InvalidConfig("count must be > 0".to_string()));
        }
        Ok(cfg)
    }
}

#[derive(Default)]
pub struct IcmpChecker;

impl IcmpChecker {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Checker for IcmpChecker {
    fn task_type(&self) -> TaskType {
        TaskType::Icmp
    }

    fn validate_config(&self, config: &Value) -> Result<(), ValidationError> {
        IcmpConfig::parse(config).map(|_| ())
    }

    #[tracing::instrument(skip_all, fields(check_id = %task.check_id, execution_id = %task.execution_id))]
    async fn execute(&self, task: &Task) -> CheckResult {
        let start = Instant::now();
        let now = chrono::Utc::now();

        let cfg = match IcmpConfig::parse(&task.config) {
            Ok(cfg) => cfg,
            Err(e) => return failure(task, start, now, e.to_string()),
        };

        #[cfg(feature = "icmp-raw")]
        {
            return raw_echo(task, &cfg, start, now).await;
        }

        #[cfg(not(feature = "icmp-raw"))]
        {
            tcp_fallback_probe(task, &cfg, start, now).await
        }
    }
}

#[cfg(not(feature = "icmp-raw"))]
async fn tcp_fallback_probe(
    task: &Task,
    cfg: &IcmpConfig,
    start: Instant,
    now: chrono::DateTime<chrono::Utc>,
) -> CheckResult {
    let addr = format!("{}:{}", cfg.target, FALLBACK_PROBE_PORT);
    let timeout = Duration::from_secs(cfg.timeout_secs);
    let mut replies = 0u32;

    for attempt in 0..cfg.count {
        match tokio::time::timeout(timeout, tokio::net::TcpStream::connect(&addr)).await {
            Ok(Ok(_)) => {
                replies += 1;
                break;
            }
            _ => {
                if attempt + 1 < cfg.count {
                    tokio::time::sleep(Duration::from_millis(cfg.interval_ms)).await;
                }
            }
        }
    }

    let mut metadata = std::collections::HashMap::new();
    metadata.insert("probe_method".to_string(), "tcp-fallback".to_string());
    metadata.insert("replies".to_string(), replies.to_string());

    if replies > 0 {
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
    } else {
        CheckResult {
            check_id: task.check_id.clone(),
            execution_id: task.execution_id.clone(),
            success: false,
            duration_ms: start.elapsed().as_millis() as u64,
            status_code: 0,
            error: "no reply within timeout (tcp fallback)".to_string(),
            response_body: String::new(),
            checked_at: now,
            metadata,
        }
    }
}

#[cfg(feature = "icmp-raw")]
async fn raw_echo(
    task: &Task,
    cfg: &IcmpConfig,
    start: Instant,
    now: chrono::DateTime<chrono::Utc>,
) -> CheckResult {
    use surge_ping::{Client, Config, PingIdentifier, PingSequence};

    let client = match Client::new(&Config::default()) {
        Ok(c) => c,
        Err(e) => return failure(task, start, now, format!("icmp client init failed: {e}")),
    };
    let ip = match cfg.target.parse() {
        Ok(ip) => ip,
        Err(e) => return failure(task, start, now, format!("invalid target address: {e}")),
    };

    let mut pinger = client.pinger(ip, PingIdentifier(rand::random())).await;
    pinger.timeout(Duration::from_secs(cfg.timeout_secs));

    let mut replies = 0u32;
    for seq in 0..cfg.count {
        if pinger.ping(PingSequence(seq as u16), &[]).await.is_ok() {
            replies += 1;
        }
        if seq + 1 < cfg.count {
            tokio::time::sleep(Duration::from_millis(cfg.interval_ms)).await;
        }
    }

    let mut metadata = std::collections::HashMap::new();
    metadata.insert("probe_method".to_string(), "icmp".to_string());
    metadata.insert("replies".to_string(), replies.to_string());

    CheckResult {
        check_id: task.check_id.clone(),
        execution_id: task.execution_id.clone(),
        success: replies > 0,
        duration_ms: start.elapsed().as_millis() as u64,
        status_code: 0,
        error: if replies > 0 { String::new() } else { "no icmp reply received".to_string() },
        response_body: String::new(),
        checked_at: now,
        metadata,
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
    fn rejects_empty_target() {
        let checker = IcmpChecker::new();
        let config = serde_json::json!({"target": ""});
        assert!(checker.validate_config(&config).is_err());
    }

    #[test]
    fn rejects_zero_count() {
        let checker = IcmpChecker::new();
        let config = serde_json::json!({"target": "127.0.0.1", "count": 0});
        assert!(checker.validate_config(&config).is_err());
    }

    #[test]
    fn applies_defaults() {
        let cfg = IcmpConfig::parse(&serde_json::json!({"target": "127.0.0.1"})).unwrap();
        assert_eq!(cfg.count, 3);
        assert_eq!(cfg.timeout_secs, 2);
    }
}
