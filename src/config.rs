//! Configuration *data shapes* for the engine (SPEC_FULL.md S6, S10).
//!
//! These structs are `serde`-deserializable and carry `Default` impls
//! reflecting the spec's stated defaults. Loading them from a file,
//! environment, or flags is a bootstrap concern and out of scope here —
//! a caller builds one of these however it likes and passes it in.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration wiring together every subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub queue: QueueConfig,
    pub workers: WorkerConfig,
    pub incident_client: IncidentClientConfig,
    pub cache: CacheConfig,
    #[serde(with = "humantime_secs", default = "default_shutdown_timeout")]
    pub shutdown_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue: QueueConfig::default(),
            workers: WorkerConfig::default(),
            incident_client: IncidentClientConfig::default(),
            cache: CacheConfig::default(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub url: String,
    pub queue_name: String,
    pub prefetch_count: u16,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            queue_name: "uptime-checks".to_string(),
            prefetch_count: 10,
        }
    }
}

/// Exponential-backoff-with-jitter parameters shared by the worker pool's
/// retry loop and the incident client's RPC retry loop (SPEC_FULL.md S4.4, S4.5).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: u32,
    #[serde(with = "humantime_millis")]
    pub initial_delay: Duration,
    #[serde(with = "humantime_millis")]
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Symmetric jitter factor in `[0, 1]`.
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: 0.2,
        }
    }
}

impl RetryConfig {
    /// Computes `delay = min(initial * multiplier^retry_count, max_delay)`,
    /// pre-jitter (SPEC_FULL.md S4.4). `retry_count` is zero-indexed: the
    /// delay before the first retry is `retry_count = 0`.
    pub fn base_delay(&self, retry_count: u32) -> Duration {
        let factor = self.multiplier.powi(retry_count as i32);
        let millis = (self.initial_delay.as_millis() as f64 * factor).min(self.max_delay.as_millis() as f64);
        Duration::from_millis(millis.max(0.0) as u64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub worker_count: usize,
    pub queue_size: usize,
    pub result_channel_size: usize,
    #[serde(with = "humantime_secs")]
    pub default_timeout: Duration,
    pub retry: RetryConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_count: 10,
            queue_size: 1000,
            result_channel_size: 1000,
            default_timeout: Duration::from_secs(10),
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentClientConfig {
    pub address: String,
    #[serde(with = "humantime_secs")]
    pub timeout: Duration,
    pub retry: RetryConfig,
}

impl Default for IncidentClientConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            timeout: Duration::from_secs(5),
            retry: RetryConfig { max_retries: 3, ..RetryConfig::default() },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub address: String,
    #[serde(with = "humantime_secs")]
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { address: String::new(), ttl: Duration::from_secs(5 * 60) }
    }
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

mod humantime_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        d.as_secs().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

mod humantime_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        (d.as_millis() as u64).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
