//! Core domain types: tasks, results, incidents, and the per-protocol
//! checker configuration each task projects to.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A unit of work dequeued from the broker: one check to execute once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub check_id: String,
    pub execution_id: String,
    pub target: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    #[serde(default)]
    pub config: serde_json::Value,
    pub scheduled_at: DateTime<Utc>,
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

fn default_max_retries() -> u32 {
    3
}

/// Protocol discriminant selecting which [`crate::checker::Checker`] handles a task.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Http,
    Tcp,
    Icmp,
    Grpc,
    Graphql,
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskType::Http => "http",
            TaskType::Tcp => "tcp",
            TaskType::Icmp => "icmp",
            TaskType::Grpc => "grpc",
            TaskType::Graphql => "graphql",
        };
        write!(f, "{s}")
    }
}

/// Errors raised while validating a [`Task`] before it is handed to a checker.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("check_id is required")]
    MissingCheckId,
    #[error("execution_id is required")]
    MissingExecutionId,
    #[error("target is required")]
    MissingTarget,
    #[error("scheduled_at is required")]
    MissingScheduledAt,
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("unsupported task type: {0}")]
    UnsupportedTaskType(String),
}

impl Task {
    /// Checks the invariants from SPEC_FULL.md S3: non-empty identifiers, target,
    /// and a present scheduled time. Per-protocol config shape is validated
    /// separately by the selected checker (S4.3).
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.check_id.is_empty() {
            return Err(ValidationError::MissingCheckId);
        }
        if self.execution_id.is_empty() {
            return Err(ValidationError::MissingExecutionId);
        }
        if self.target.is_empty() {
            return Err(ValidationError::MissingTarget);
        }
        Ok(())
    }
}

/// Outcome of one checker execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub check_id: String,
    pub execution_id: String,
    pub success: bool,
    pub duration_ms: u64,
    #[serde(default)]
    pub status_code: i32,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub response_body: String,
    pub checked_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckResult {
    /// Invariant from SPEC_FULL.md S8 property 2: success implies an empty error string.
    pub fn is_well_formed(&self) -> bool {
        !self.success || self.error.is_empty()
    }
}

/// Status of an [`Incident`] as tracked by the remote incident service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentStatus {
    Open,
    Acknowledged,
    Resolved,
    Suppressed,
}

/// Severity assigned to an [`Incident`], derived purely from the triggering
/// [`CheckResult`] (SPEC_FULL.md S4.5, S8 property 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Warning,
    Error,
    Critical,
}

/// Maps a failing [`CheckResult`] to a [`Severity`]. Pure function of
/// `(success, status_code)` — see SPEC_FULL.md S4.5 and S8 property 6.
///
/// `status_code == 0` (transport failure, no HTTP-style status observed) maps
/// to [`Severity::Error`] by default; see DESIGN.md for the open-question
/// rationale (an operator may prefer Critical for pure transport failures).
pub fn severity_for(success: bool, status_code: i32) -> Severity {
    if success {
        return Severity::Warning;
    }
    if status_code >= 500 {
        Severity::Critical
    } else {
        Severity::Error
    }
}

/// An incident opened (or updated) in response to a failing check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub id: String,
    pub check_id: String,
    pub execution_id: String,
    pub tenant_id: String,
    pub title: String,
    pub description: String,
    pub status: IncidentStatus,
    pub severity: Severity,
    pub error_message: String,
    pub status_code: i32,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}
