//! The checker family: a closed set of protocol probers selected by
//! [`TaskType`](crate::domain::TaskType), plus the factory that constructs
//! them (SPEC_FULL.md S4.3, S9).
//!
//! Grounded on the registry pattern in the teacher's `control::command`
//! module (`CommandFactory`/`CommandRegistry`): a label -> factory map
//! guarded by an `RwLock`, generalized here from string labels to
//! [`TaskType`] variants.

mod graphql;
mod grpc;
mod http;
mod icmp;
mod tcp;

pub use graphql::GraphqlChecker;
pub use grpc::GrpcChecker;
pub use http::HttpChecker;
pub use icmp::IcmpChecker;
pub use tcp::TcpChecker;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{CheckResult, Task, TaskType, ValidationError};

/// Errors a [`Checker`] can surface to the orchestrator. Transport and
/// protocol-level failures are *not* represented here — those become a
/// failing [`CheckResult`] (S4.3: `execute` is infallible at the transport
/// layer). This type covers only pre-flight configuration rejection.
#[derive(Debug, Error)]
pub enum CheckerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Common contract implemented by every protocol prober.
///
/// `execute` must never panic and never return `Err`: a transport or
/// parsing failure is reported as `CheckResult { success: false, .. }`.
#[async_trait]
pub trait Checker: Send + Sync {
    fn task_type(&self) -> TaskType;

    /// Pre-flight validation of the task's free-form `config` map. Called by
    /// the factory/orchestrator before the first `execute`.
    fn validate_config(&self, config: &serde_json::Value) -> Result<(), ValidationError>;

    async fn execute(&self, task: &Task) -> CheckResult;
}

/// Constructs a [`Checker`] instance for a given [`TaskType`].
pub trait CheckerFactory: Send + Sync {
    fn create(&self) -> Arc<dyn Checker>;
}

struct FnFactory<F>(F);

impl<F> CheckerFactory for FnFactory<F>
where
    F: Fn() -> Arc<dyn Checker> + Send + Sync,
{
    fn create(&self) -> Arc<dyn Checker> {
        (self.0)()
    }
}

/// Maps [`TaskType`] to a constructed [`Checker`]. Unknown types are a
/// permanent failure to the orchestrator (SPEC_FULL.md S4.3, S7).
pub struct CheckerRegistry {
    factories: RwLock<HashMap<TaskType, Box<dyn CheckerFactory>>>,
}

impl Default for CheckerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckerRegistry {
    pub fn new() -> Self {
        Self { factories: RwLock::new(HashMap::new()) }
    }

    /// Registers the HTTP, TCP, ICMP, gRPC, and GraphQL checkers with their
    /// default constructors. The canonical way to obtain a ready-to-use
    /// registry.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register(TaskType::Http, || Arc::new(HttpChecker::new()) as Arc<dyn Checker>);
        registry.register(TaskType::Tcp, || Arc::new(TcpChecker::new()) as Arc<dyn Checker>);
        registry.register(TaskType::Icmp, || Arc::new(IcmpChecker::new()) as Arc<dyn Checker>);
        registry.register(TaskType::Grpc, || Arc::new(GrpcChecker::new()) as Arc<dyn Checker>);
        registry
            .register(TaskType::Graphql, || Arc::new(GraphqlChecker::new()) as Arc<dyn Checker>);
        registry
    }

    pub fn register<F>(&self, task_type: TaskType, factory: F)
    where
        F: Fn() -> Arc<dyn Checker> + Send + Sync + 'static,
    {
        self.factories
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(task_type, Box::new(FnFactory(factory)));
    }

    /// Look up and construct a checker for `task_type`.
    ///
    /// Returns `None` for unregistered types; the caller treats this as an
    /// "unsupported task type" validation error (S4.3, scenario 4 in S8).
    pub fn create(&self, task_type: TaskType) -> Option<Arc<dyn Checker>> {
        self.factories
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&task_type)
            .map(|f| f.create())
    }

    pub fn contains(&self, task_type: TaskType) -> bool {
        self.factories.read().unwrap_or_else(|poisoned| poisoned.into_inner()).contains_key(&task_type)
    }
}
