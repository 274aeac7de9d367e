#![forbid(unsafe_code)]

//! # uptime-engine
//!
//! The core execution engine behind an uptime-monitoring platform: consume
//! scheduled checks off a queue with at-least-once delivery, dispatch them
//! across a bounded-concurrency worker pool to protocol-specific checkers
//! (HTTP, TCP, ICMP, gRPC, GraphQL), retry transient failures with
//! exponential backoff and jitter, and fan finished results out to a
//! repository, cache, and incident client.
//!
//! ## Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use tokio::sync::mpsc;
//! use uptime_engine::cache::MemoryCache;
//! use uptime_engine::check_service::CheckService;
//! use uptime_engine::checker::CheckerRegistry;
//! use uptime_engine::config::WorkerConfig;
//! use uptime_engine::domain::{Task, TaskType};
//! use uptime_engine::incident::MemoryIncidentClient;
//! use uptime_engine::repository::MemoryRepository;
//! use uptime_engine::worker_pool::WorkerPool;
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = Arc::new(CheckerRegistry::with_defaults());
//!     let (results_tx, mut results_rx) = mpsc::channel(16);
//!     let pool = WorkerPool::spawn(WorkerConfig::default(), registry, results_tx);
//!
//!     let service = CheckService::new(
//!         Arc::new(MemoryRepository::new()),
//!         Arc::new(MemoryCache::default()),
//!         Arc::new(MemoryIncidentClient::new()),
//!         vec![],
//!     );
//!
//!     pool.submit(Task {
//!         check_id: "demo".to_string(),
//!         execution_id: "1".to_string(),
//!         target: "127.0.0.1".to_string(),
//!         task_type: TaskType::Tcp,
//!         config: serde_json::json!({"host": "127.0.0.1", "port": 1, "timeout_secs": 1}),
//!         scheduled_at: chrono::Utc::now(),
//!         tenant_id: String::new(),
//!         priority: 0,
//!         retry_count: 0,
//!         max_retries: 0,
//!         metadata: Default::default(),
//!     })
//!     .await
//!     .unwrap();
//!
//!     let result = results_rx.recv().await.unwrap();
//!     service.process_result(result).await;
//!
//!     pool.stop(std::time::Duration::from_secs(1)).await;
//! }
//! ```

pub mod backoff;
pub mod bulkhead;
pub mod cache;
pub mod check_service;
pub mod checker;
pub mod config;
pub mod domain;
pub mod error;
pub mod incident;
pub mod jitter;
pub mod queue;
pub mod repository;
pub mod retry;
pub mod sink;
pub mod sleeper;
pub mod timeout;
pub mod worker_pool;

pub use backoff::Backoff;
pub use bulkhead::BulkheadPolicy;
pub use cache::{CacheError, MemoryCache, ResultCache};
pub use check_service::{CheckService, CheckServiceError};
pub use checker::{Checker, CheckerError, CheckerFactory, CheckerRegistry};
pub use config::{CacheConfig, EngineConfig, IncidentClientConfig, QueueConfig, RetryConfig, WorkerConfig};
pub use domain::{severity_for, CheckResult, Incident, IncidentStatus, Severity, Task, TaskType, ValidationError};
pub use error::ResilienceError;
pub use incident::{fingerprint, IncidentClient, IncidentError, MemoryIncidentClient};
pub use jitter::Jitter;
pub use queue::{ConsumerError, Delivery, QueueConsumer};
pub use repository::{MemoryRepository, RepositoryError, ResultRepository};
pub use retry::{BuildError, RetryPolicy, RetryPolicyBuilder};
pub use sink::{MulticastSink, NullSink, ResultSink, SinkError};
pub use sleeper::{InstantSleeper, Sleeper, TokioSleeper, TrackingSleeper};
pub use timeout::{TimeoutError, TimeoutPolicy, MAX_TIMEOUT};
pub use worker_pool::{WorkerPool, WorkerPoolStats, WorkerPoolStatsSnapshot};

pub mod prelude;
