//! Wires the worker pool to in-memory sinks: one healthy TCP-shaped check
//! and one that exhausts its retries, printing the repository/cache/
//! incident state at the end.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use uptime_engine::cache::{MemoryCache, ResultCache};
use uptime_engine::check_service::{decode_task, CheckService};
use uptime_engine::checker::CheckerRegistry;
use uptime_engine::config::{RetryConfig, WorkerConfig};
use uptime_engine::incident::MemoryIncidentClient;
use uptime_engine::repository::{MemoryRepository, ResultRepository};
use uptime_engine::worker_pool::WorkerPool;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let payloads = vec![
        serde_json::to_vec(&serde_json::json!({
            "check_id": "demo-tcp-ok",
            "execution_id": "1",
            "target": "127.0.0.1:1",
            "type": "tcp",
            "config": {"host": "127.0.0.1", "port": 1, "timeout_secs": 1},
            "scheduled_at": chrono::Utc::now().to_rfc3339(),
        }))
        .unwrap(),
        serde_json::to_vec(&serde_json::json!({
            "check_id": "demo-tcp-fail",
            "execution_id": "1",
            "target": "127.0.0.1:1",
            "type": "tcp",
            "config": {"host": "127.0.0.1", "port": 1, "timeout_secs": 1},
            "scheduled_at": chrono::Utc::now().to_rfc3339(),
            "max_retries": 1,
        }))
        .unwrap(),
        b"not json at all".to_vec(),
    ];

    let registry = Arc::new(CheckerRegistry::with_defaults());
    let (results_tx, mut results_rx) = mpsc::channel(16);
    let worker_config = WorkerConfig {
        worker_count: 2,
        retry: RetryConfig {
            max_retries: 1,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
            multiplier: 2.0,
            jitter: 0.2,
        },
        ..WorkerConfig::default()
    };
    let pool = WorkerPool::spawn(worker_config, registry, results_tx);

    let repository = Arc::new(MemoryRepository::new());
    let cache = Arc::new(MemoryCache::default());
    let incidents = Arc::new(MemoryIncidentClient::new());
    let service = CheckService::new(repository.clone(), cache.clone(), incidents.clone(), vec![]);

    let mut submitted = 0;
    for payload in &payloads {
        match decode_task(payload) {
            Ok(task) => {
                submitted += 1;
                pool.submit(task).await.unwrap();
            }
            Err(e) => tracing::warn!(error = %e, "dropping malformed message"),
        }
    }

    for _ in 0..submitted {
        let result = results_rx.recv().await.expect("worker pool closed early");
        println!("check={} success={}", result.check_id, result.success);
        service.process_result(result).await;
    }

    pool.stop(Duration::from_secs(2)).await;

    println!(
        "demo-tcp-ok cached: {:?}",
        cache.get("demo-tcp-ok").await.unwrap().map(|r| r.success)
    );
    println!(
        "demo-tcp-fail stored: {:?}",
        repository.get("demo-tcp-fail", "1").await.map(|r| r.success)
    );
    println!("open incidents: {:?}", incidents.open_incident_ids());
}
