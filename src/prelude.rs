//! Convenient re-exports for the most commonly used engine types.
pub use crate::{
    cache::{CacheError, MemoryCache, ResultCache},
    check_service::CheckService,
    checker::{Checker, CheckerError, CheckerFactory, CheckerRegistry},
    config::{EngineConfig, RetryConfig, WorkerConfig},
    domain::{severity_for, CheckResult, Severity, Task, TaskType},
    incident::{fingerprint, IncidentClient, IncidentError, MemoryIncidentClient},
    queue::{ConsumerError, Delivery, QueueConsumer},
    repository::{MemoryRepository, RepositoryError, ResultRepository},
    sink::{MulticastSink, NullSink, ResultSink, SinkError},
    worker_pool::WorkerPool,
    Backoff, BulkheadPolicy, Jitter, ResilienceError, RetryPolicy, Sleeper, TimeoutPolicy,
};
