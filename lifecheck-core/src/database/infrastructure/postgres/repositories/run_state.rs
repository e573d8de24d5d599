use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lifecheck_model::{
    LogDetail, LogDetailId, LogRun, LogRunId, RunPhase, RunState,
};
use sqlx::PgPool;

use crate::{
    database::ports::run_state::RunStateRepository,
    error::{CoreError, Result},
};

#[derive(Clone, Debug)]
pub struct PostgresRunStateRepository {
    pool: PgPool,
}

impl PostgresRunStateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RunStateRepository for PostgresRunStateRepository {
    async fn load_state(&self) -> Result<Option<RunState>> {
        let row = sqlx::query_as::<_, RunStateRow>(
            r#"
            SELECT phase, log_id
            FROM run_state
            WHERE id = 1
            "#,
        )
        .fetch_optional(self.pool())
        .await
        .map_err(|e| {
            CoreError::Database(format!("Failed to load run state: {e}"))
        })?;

        row.map(RunState::try_from).transpose()
    }

    async fn create_log_run(&self) -> Result<LogRunId> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO log_runs (phase)
            VALUES ($1)
            RETURNING id
            "#,
        )
        .bind(RunPhase::Idle.code())
        .fetch_one(self.pool())
        .await
        .map_err(|e| {
            CoreError::Database(format!("Failed to create log run: {e}"))
        })?;

        Ok(LogRunId(id))
    }

    async fn record_transition(
        &self,
        log_id: LogRunId,
        phase: RunPhase,
        row_count: Option<i64>,
    ) -> Result<LogDetailId> {
        let mut tx = self.pool().begin().await.map_err(|e| {
            CoreError::Database(format!("Failed to start transaction: {e}"))
        })?;

        sqlx::query(
            r#"
            UPDATE log_runs
            SET phase = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(log_id.get())
        .bind(phase.code())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            CoreError::Database(format!("Failed to update log run phase: {e}"))
        })?;

        sqlx::query(
            r#"
            INSERT INTO run_state (id, phase, log_id, updated_at)
            VALUES (1, $1, $2, NOW())
            ON CONFLICT (id) DO UPDATE SET
                phase = EXCLUDED.phase,
                log_id = EXCLUDED.log_id,
                updated_at = NOW()
            "#,
        )
        .bind(phase.code())
        .bind(log_id.get())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            CoreError::Database(format!("Failed to persist run state: {e}"))
        })?;

        let detail_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO log_details (log_id, phase, row_count)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(log_id.get())
        .bind(phase.code())
        .bind(row_count)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            CoreError::Database(format!("Failed to insert log detail: {e}"))
        })?;

        tx.commit().await.map_err(|e| {
            CoreError::Database(format!(
                "Failed to commit phase transition: {e}"
            ))
        })?;

        Ok(LogDetailId(detail_id))
    }

    async fn increment_checked(&self, detail_id: LogDetailId) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE log_details
            SET checked_count = checked_count + 1, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(detail_id.get())
        .execute(self.pool())
        .await
        .map_err(|e| {
            CoreError::Database(format!(
                "Failed to increment progress counter: {e}"
            ))
        })?;

        Ok(())
    }

    async fn record_failure(
        &self,
        log_id: LogRunId,
        phase: RunPhase,
        message: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE log_runs
            SET last_error = $2, failed_at = NOW(), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(log_id.get())
        .bind(format!("[{}] {message}", phase.label()))
        .execute(self.pool())
        .await
        .map_err(|e| {
            CoreError::Database(format!("Failed to record run failure: {e}"))
        })?;

        Ok(())
    }

    async fn log_details(&self, log_id: LogRunId) -> Result<Vec<LogDetail>> {
        let rows = sqlx::query_as::<_, LogDetailRow>(
            r#"
            SELECT id, log_id, phase, row_count, checked_count,
                   created_at, updated_at
            FROM log_details
            WHERE log_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(log_id.get())
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            CoreError::Database(format!("Failed to load log details: {e}"))
        })?;

        rows.into_iter().map(LogDetail::try_from).collect()
    }

    async fn list_runs(&self, limit: i64) -> Result<Vec<LogRun>> {
        let rows = sqlx::query_as::<_, LogRunRow>(
            r#"
            SELECT id, phase, started_at, updated_at, last_error, failed_at
            FROM log_runs
            ORDER BY id DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            CoreError::Database(format!("Failed to list log runs: {e}"))
        })?;

        rows.into_iter().map(LogRun::try_from).collect()
    }
}

#[derive(sqlx::FromRow)]
struct RunStateRow {
    phase: i16,
    log_id: Option<i64>,
}

impl TryFrom<RunStateRow> for RunState {
    type Error = CoreError;

    fn try_from(row: RunStateRow) -> Result<Self> {
        Ok(RunState {
            phase: RunPhase::from_code(row.phase)?,
            log_id: row.log_id.map(LogRunId),
        })
    }
}

#[derive(sqlx::FromRow)]
struct LogRunRow {
    id: i64,
    phase: i16,
    started_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_error: Option<String>,
    failed_at: Option<DateTime<Utc>>,
}

impl TryFrom<LogRunRow> for LogRun {
    type Error = CoreError;

    fn try_from(row: LogRunRow) -> Result<Self> {
        Ok(LogRun {
            id: LogRunId(row.id),
            phase: RunPhase::from_code(row.phase)?,
            started_at: row.started_at,
            updated_at: row.updated_at,
            last_error: row.last_error,
            failed_at: row.failed_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct LogDetailRow {
    id: i64,
    log_id: i64,
    phase: i16,
    row_count: Option<i64>,
    checked_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<LogDetailRow> for LogDetail {
    type Error = CoreError;

    fn try_from(row: LogDetailRow) -> Result<Self> {
        Ok(LogDetail {
            id: LogDetailId(row.id),
            log_id: LogRunId(row.log_id),
            phase: RunPhase::from_code(row.phase)?,
            row_count: row.row_count,
            checked_count: row.checked_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
