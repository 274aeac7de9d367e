//! Bounded-concurrency worker pool (SPEC_FULL.md S4.4).
//!
//! A fixed number of workers drain a bounded `tokio::mpsc` channel of
//! [`Task`]s, dispatching each to the checker registry and retrying
//! transient failures with exponential backoff and symmetric jitter before
//! forwarding the final [`CheckResult`] downstream. Concurrency is bounded
//! by `worker_count`, not by a semaphore: this is the ordinary tokio
//! worker-pool shape (N consumers on one channel) rather than the
//! admission-gate shape `BulkheadPolicy` models, since a worker pool needs
//! backlogged tasks to *wait* for a slot rather than be rejected.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::checker::CheckerRegistry;
use crate::config::{RetryConfig, WorkerConfig};
use crate::domain::{CheckResult, Task};
use crate::jitter::Jitter;
use crate::sleeper::{Sleeper, TokioSleeper};

#[derive(Debug, Default)]
pub struct WorkerPoolStats {
    pub received: AtomicU64,
    pub completed: AtomicU64,
    pub failed: AtomicU64,
    pub retried: AtomicU64,
    pub active: AtomicUsize,
    pub queue_length: AtomicUsize,
    pub total_duration_ms: AtomicU64,
}

impl WorkerPoolStats {
    pub fn snapshot(&self) -> WorkerPoolStatsSnapshot {
        WorkerPoolStatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            active: self.active.load(Ordering::Relaxed),
            queue_length: self.queue_length.load(Ordering::Relaxed),
            total_duration_ms: self.total_duration_ms.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPoolStatsSnapshot {
    pub received: u64,
    pub completed: u64,
    pub failed: u64,
    pub retried: u64,
    pub active: usize,
    pub queue_length: usize,
    pub total_duration_ms: u64,
}

/// A bounded-concurrency pool of `worker_count` workers draining a shared
/// task queue, each running a check to completion (including its own
/// retries) before picking up the next task.
pub struct WorkerPool {
    sender: mpsc::Sender<Task>,
    workers: Vec<JoinHandle<()>>,
    stats: Arc<WorkerPoolStats>,
}

impl WorkerPool {
    /// Spawns `config.worker_count` workers. Every completed check (success
    /// or exhausted-retry failure) is pushed onto `results`; the caller owns
    /// draining that channel (typically into the check service's sinks).
    pub fn spawn(
        config: WorkerConfig,
        registry: Arc<CheckerRegistry>,
        results: mpsc::Sender<CheckResult>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel::<Task>(config.queue_size);
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let stats = Arc::new(WorkerPoolStats::default());

        let workers = (0..config.worker_count)
            .map(|id| {
                tokio::spawn(worker_loop(
                    id,
                    receiver.clone(),
                    registry.clone(),
                    results.clone(),
                    config.retry,
                    stats.clone(),
                    Arc::new(TokioSleeper),
                ))
            })
            .collect();

        Self { sender, workers, stats }
    }

    /// Enqueues a task. Blocks (without busy-waiting) if the queue is full,
    /// providing the pool's backpressure to callers.
    pub async fn submit(&self, task: Task) -> Result<(), mpsc::error::SendError<Task>> {
        self.stats.received.fetch_add(1, Ordering::Relaxed);
        self.stats.queue_length.fetch_add(1, Ordering::Relaxed);
        self.sender.send(task).await
    }

    pub fn stats(&self) -> WorkerPoolStatsSnapshot {
        self.stats.snapshot()
    }

    /// Stops accepting new tasks and waits for in-flight work to drain, up
    /// to `deadline`. Workers still running past the deadline are aborted.
    pub async fn stop(self, deadline: Duration) {
        drop(self.sender);
        let join_all = futures::future::join_all(self.workers.into_iter().map(|h| async move {
            let _ = tokio::time::timeout(deadline, h).await;
        }));
        join_all.await;
    }
}

async fn worker_loop(
    _id: usize,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<Task>>>,
    registry: Arc<CheckerRegistry>,
    results: mpsc::Sender<CheckResult>,
    retry: RetryConfig,
    stats: Arc<WorkerPoolStats>,
    sleeper: Arc<dyn Sleeper>,
) {
    loop {
        let task = {
            let mut receiver = receiver.lock().await;
            receiver.recv().await
        };
        let Some(task) = task else { break };

        stats.queue_length.fetch_sub(1, Ordering::Relaxed);
        stats.active.fetch_add(1, Ordering::Relaxed);
        let start = Instant::now();

        let result = run_with_retry(&task, &registry, &retry, &sleeper, &stats).await;

        stats.active.fetch_sub(1, Ordering::Relaxed);
        stats.total_duration_ms.fetch_add(start.elapsed().as_millis() as u64, Ordering::Relaxed);
        if result.success {
            stats.completed.fetch_add(1, Ordering::Relaxed);
        } else {
            stats.failed.fetch_add(1, Ordering::Relaxed);
        }

        if results.send(result).await.is_err() {
            break;
        }
    }
}

/// Dispatches `task` to its checker, retrying a retriable failure up to
/// `task.max_retries` times with exponential backoff and symmetric jitter
/// (SPEC_FULL.md S4.4 I-3). The retry ceiling is the task's own budget, not
/// the pool's `RetryConfig` (which only shapes backoff timing): a task with
/// `max_retries = 0` always gets exactly one attempt (S8 boundary), and a
/// task already at `retry_count == max_retries` is never re-enqueued (S8
/// invariant 1). Unregistered task types, pre-flight validation errors, and
/// non-retriable failure classes (S4.4/S7) are not retried: they are
/// permanent failures.
async fn run_with_retry(
    task: &Task,
    registry: &CheckerRegistry,
    retry: &RetryConfig,
    sleeper: &Arc<dyn Sleeper>,
    stats: &WorkerPoolStats,
) -> CheckResult {
    let Some(checker) = registry.create(task.task_type) else {
        return unsupported_type_result(task);
    };

    if let Err(e) = checker.validate_config(&task.config) {
        return invalid_config_result(task, &e.to_string());
    }

    let jitter = Jitter::symmetric(retry.jitter);
    let mut retry_count = task.retry_count;
    loop {
        let result = checker.execute(task).await;
        if result.success || retry_count >= task.max_retries || !is_retriable(&result) {
            return result;
        }
        stats.retried.fetch_add(1, Ordering::Relaxed);
        let delay = jitter.apply(retry.base_delay(retry_count));
        sleeper.sleep(delay).await;
        retry_count += 1;
    }
}

/// Classifies a failed [`CheckResult`] as retriable per SPEC_FULL.md S4.4/S7:
/// server errors (status >= 500) and transport failures (status == 0, or
/// transient error text) are retriable; 4xx is a permanent client error
/// except 408 (request timeout) and 429 (rate limited).
fn is_retriable(result: &CheckResult) -> bool {
    match result.status_code {
        0 => true,
        408 | 429 => true,
        s if s >= 500 => true,
        s if (400..500).contains(&s) => false,
        _ => {
            let error = result.error.to_lowercase();
            error.contains("timeout") || error.contains("connection")
        }
    }
}

fn unsupported_type_result(task: &Task) -> CheckResult {
    CheckResult {
        check_id: task.check_id.clone(),
        execution_id: task.execution_id.clone(),
        success: false,
        duration_ms: 0,
        status_code: 0,
        error: format!("unsupported task type: {}", task.task_type),
        response_body: String::new(),
        checked_at: chrono::Utc::now(),
        metadata: Default::default(),
    }
}

fn invalid_config_result(task: &Task, message: &str) -> CheckResult {
    CheckResult {
        check_id: task.check_id.clone(),
        execution_id: task.execution_id.clone(),
        success: false,
        duration_ms: 0,
        status_code: 0,
        error: format!("invalid config: {message}"),
        response_body: String::new(),
        checked_at: chrono::Utc::now(),
        metadata: Default::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskType;

    fn sample_task(task_type: TaskType, config: serde_json::Value) -> Task {
        sample_task_with_retries(task_type, config, 3)
    }

    fn sample_task_with_retries(task_type: TaskType, config: serde_json::Value, max_retries: u32) -> Task {
        Task {
            check_id: "c1".to_string(),
            execution_id: "e1".to_string(),
            target: "irrelevant".to_string(),
            task_type,
            config,
            scheduled_at: chrono::Utc::now(),
            tenant_id: String::new(),
            priority: 0,
            retry_count: 0,
            max_retries,
            metadata: Default::default(),
        }
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_retries: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            multiplier: 2.0,
            jitter: 0.0,
        }
    }

    #[tokio::test]
    async fn unsupported_task_type_fails_without_retry() {
        let registry = Arc::new(CheckerRegistry::new());
        let (results_tx, mut results_rx) = mpsc::channel(1);
        let pool = WorkerPool::spawn(
            WorkerConfig { worker_count: 1, queue_size: 4, result_channel_size: 4, ..WorkerConfig::default() },
            registry,
            results_tx,
        );
        pool.submit(sample_task(TaskType::Http, serde_json::json!({}))).await.unwrap();
        let result = results_rx.recv().await.unwrap();
        assert!(!result.success);
        assert!(result.error.contains("invalid config"));
        pool.stop(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn tcp_check_against_unroutable_port_retries_then_fails() {
        let registry = Arc::new(CheckerRegistry::with_defaults());
        let (results_tx, mut results_rx) = mpsc::channel(1);
        let mut config = WorkerConfig { worker_count: 1, queue_size: 4, result_channel_size: 4, ..WorkerConfig::default() };
        config.retry = fast_retry();
        let pool = WorkerPool::spawn(config, registry, results_tx);

        let task = sample_task_with_retries(
            TaskType::Tcp,
            serde_json::json!({"host": "127.0.0.1", "port": 1, "timeout_secs": 1}),
            2,
        );
        pool.submit(task).await.unwrap();
        let result = results_rx.recv().await.unwrap();
        assert!(!result.success);
        let stats = pool.stats();
        assert_eq!(stats.retried, 2);
        pool.stop(Duration::from_secs(1)).await;
    }

    fn failed_result(status_code: i32, error: &str) -> CheckResult {
        CheckResult {
            check_id: "c1".to_string(),
            execution_id: "e1".to_string(),
            success: false,
            duration_ms: 0,
            status_code,
            error: error.to_string(),
            response_body: String::new(),
            checked_at: chrono::Utc::now(),
            metadata: Default::default(),
        }
    }

    #[test]
    fn server_errors_and_transport_failures_are_retriable() {
        assert!(is_retriable(&failed_result(0, "connection refused")));
        assert!(is_retriable(&failed_result(500, "internal server error")));
        assert!(is_retriable(&failed_result(503, "service unavailable")));
        assert!(is_retriable(&failed_result(408, "request timeout")));
        assert!(is_retriable(&failed_result(429, "too many requests")));
    }

    #[test]
    fn client_errors_other_than_408_429_are_not_retriable() {
        assert!(!is_retriable(&failed_result(404, "not found")));
        assert!(!is_retriable(&failed_result(400, "bad request")));
        assert!(!is_retriable(&failed_result(401, "unauthorized")));
    }

    #[tokio::test]
    async fn task_at_max_retries_is_never_re_enqueued() {
        let registry = Arc::new(CheckerRegistry::with_defaults());
        let (results_tx, mut results_rx) = mpsc::channel(1);
        let mut config = WorkerConfig { worker_count: 1, queue_size: 4, result_channel_size: 4, ..WorkerConfig::default() };
        config.retry = fast_retry();
        let pool = WorkerPool::spawn(config, registry, results_tx);

        let task = sample_task_with_retries(
            TaskType::Tcp,
            serde_json::json!({"host": "127.0.0.1", "port": 1, "timeout_secs": 1}),
            0,
        );
        pool.submit(task).await.unwrap();
        let _ = results_rx.recv().await.unwrap();
        let stats = pool.stats();
        assert_eq!(stats.retried, 0);
        pool.stop(Duration::from_secs(1)).await;
    }
}
