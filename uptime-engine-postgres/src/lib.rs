//! Postgres-backed `ResultRepository` for `uptime-engine` (companion crate).
//!
//! Bring your own `sqlx::PgPool`. Expects a `check_results` table shaped
//! like:
//!
//! ```sql
//! create table check_results (
//!     check_id      text not null,
//!     execution_id  text not null,
//!     success       boolean not null,
//!     duration_ms   bigint not null,
//!     status_code   integer not null,
//!     error         text not null default '',
//!     response_body text not null default '',
//!     checked_at    timestamptz not null,
//!     metadata      jsonb not null default '{}',
//!     primary key (check_id, execution_id)
//! );
//! ```

#[cfg(feature = "client")]
use async_trait::async_trait;
#[cfg(feature = "client")]
use uptime_engine::domain::CheckResult;
#[cfg(feature = "client")]
use uptime_engine::repository::{RepositoryError, ResultRepository};

#[cfg(feature = "client")]
pub struct PostgresRepository {
    pool: sqlx::PgPool,
}

#[cfg(feature = "client")]
impl PostgresRepository {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[cfg(feature = "client")]
#[async_trait]
impl ResultRepository for PostgresRepository {
    async fn store(&self, result: &CheckResult) -> Result<(), RepositoryError> {
        let metadata = serde_json::to_value(&result.metadata)
            .map_err(|e| RepositoryError::Rejected(e.to_string()))?;

        sqlx::query(
            "insert into check_results \
                (check_id, execution_id, success, duration_ms, status_code, error, response_body, checked_at, metadata) \
             values ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             on conflict (check_id, execution_id) do update set \
                success = excluded.success, duration_ms = excluded.duration_ms, \
                status_code = excluded.status_code, error = excluded.error, \
                response_body = excluded.response_body, checked_at = excluded.checked_at, \
                metadata = excluded.metadata",
        )
        .bind(&result.check_id)
        .bind(&result.execution_id)
        .bind(result.success)
        .bind(result.duration_ms as i64)
        .bind(result.status_code)
        .bind(&result.error)
        .bind(&result.response_body)
        .bind(result.checked_at)
        .bind(metadata)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Unavailable(e.to_string()))?;

        Ok(())
    }

    async fn get(
        &self,
        check_id: &str,
        execution_id: &str,
    ) -> Result<CheckResult, RepositoryError> {
        let row = sqlx::query_as::<_, Row>(
            "select check_id, execution_id, success, duration_ms, status_code, error, \
                response_body, checked_at, metadata \
             from check_results where check_id = $1 and execution_id = $2",
        )
        .bind(check_id)
        .bind(execution_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::Unavailable(e.to_string()))?;

        row.map(Row::into_result).ok_or_else(|| RepositoryError::NotFound {
            check_id: check_id.to_string(),
            execution_id: execution_id.to_string(),
        })
    }

    async fn recent(&self, check_id: &str, limit: usize) -> Result<Vec<CheckResult>, RepositoryError> {
        let rows = sqlx::query_as::<_, Row>(
            "select check_id, execution_id, success, duration_ms, status_code, error, \
                response_body, checked_at, metadata \
             from check_results where check_id = $1 order by checked_at desc limit $2",
        )
        .bind(check_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Unavailable(e.to_string()))?;

        Ok(rows.into_iter().map(Row::into_result).collect())
    }
}

#[cfg(feature = "client")]
#[derive(sqlx::FromRow)]
struct Row {
    check_id: String,
    execution_id: String,
    success: bool,
    duration_ms: i64,
    status_code: i32,
    error: String,
    response_body: String,
    checked_at: chrono::DateTime<chrono::Utc>,
    metadata: serde_json::Value,
}

#[cfg(feature = "client")]
impl Row {
    fn into_result(self) -> CheckResult {
        CheckResult {
            check_id: self.check_id,
            execution_id: self.execution_id,
            success: self.success,
            duration_ms: self.duration_ms as u64,
            status_code: self.status_code,
            error: self.error,
            response_body: self.response_body,
            checked_at: self.checked_at,
            metadata: serde_json::from_value(self.metadata).unwrap_or_default(),
        }
    }
}
