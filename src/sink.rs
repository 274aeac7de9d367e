//! Result sinks (SPEC_FULL.md S4.6, S10).
//!
//! Generalizes the teacher's telemetry-sink fan-out pattern from emitting
//! resilience events to emitting `CheckResult`s. A sink failure must never
//! fail the check pipeline (SPEC_FULL.md S8 property 5); `emit_best_effort`
//! is the one entry point the check service calls, and it swallows errors
//! after logging them.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::CheckResult;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink unavailable: {0}")]
    Unavailable(String),

    #[error("sink rejected result: {0}")]
    Rejected(String),
}

/// Something that wants to know about finished checks: a repository, a
/// cache, a metrics exporter, a webhook fan-out. Implementations should be
/// cheap to clone (wrap shared state in `Arc`) since sinks are typically
/// composed into a `MulticastSink` and invoked from every worker.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn emit(&self, result: &CheckResult) -> Result<(), SinkError>;

    /// Human-readable name for logging when `emit` fails.
    fn name(&self) -> &str {
        "sink"
    }
}

/// Calls `sink.emit`, logging and discarding any error. This is the shape
/// every caller in the check pipeline should use; a sink outage must never
/// propagate back into task processing.
pub async fn emit_best_effort(sink: &dyn ResultSink, result: &CheckResult) {
    if let Err(e) = sink.emit(result).await {
        tracing::warn!(sink = sink.name(), error = %e, check_id = %result.check_id, "sink emit failed, continuing");
    }
}

/// Fans a result out to every member sink, independently and best-effort.
pub struct MulticastSink {
    sinks: Vec<std::sync::Arc<dyn ResultSink>>,
}

impl MulticastSink {
    pub fn new(sinks: Vec<std::sync::Arc<dyn ResultSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl ResultSink for MulticastSink {
    async fn emit(&self, result: &CheckResult) -> Result<(), SinkError> {
        for sink in &self.sinks {
            emit_best_effort(sink.as_ref(), result).await;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "multicast"
    }
}

/// Discards everything. Useful as a default when no sinks are configured,
/// or as a placeholder in tests that don't care about side effects.
#[derive(Default)]
pub struct NullSink;

#[async_trait]
impl ResultSink for NullSink {
    async fn emit(&self, _result: &CheckResult) -> Result<(), SinkError> {
        Ok(())
    }

    fn name(&self) -> &str {
        "null"
    }
}
