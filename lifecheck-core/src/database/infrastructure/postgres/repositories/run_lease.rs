use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    database::ports::run_lease::{RunLeaseRecord, RunLeaseRepository},
    error::{CoreError, Result},
    orchestration::lease::LeaseId,
};

#[derive(Clone, Debug)]
pub struct PostgresRunLeaseRepository {
    pool: PgPool,
}

impl PostgresRunLeaseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn ttl_millis(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)
}

#[async_trait]
impl RunLeaseRepository for PostgresRunLeaseRepository {
    async fn try_acquire(
        &self,
        lease_id: LeaseId,
        owner: &str,
        ttl: Duration,
    ) -> Result<bool> {
        // Expiry uses the database clock, never the caller's.
        let claimed: Option<Uuid> = sqlx::query_scalar(
            r#"
            INSERT INTO run_lease (id, lease_id, lease_owner, acquired_at, lease_expires_at)
            VALUES (1, $1, $2, NOW(), NOW() + ($3::bigint) * INTERVAL '1 millisecond')
            ON CONFLICT (id) DO UPDATE SET
                lease_id = EXCLUDED.lease_id,
                lease_owner = EXCLUDED.lease_owner,
                acquired_at = EXCLUDED.acquired_at,
                lease_expires_at = EXCLUDED.lease_expires_at
            WHERE run_lease.lease_expires_at <= NOW()
            RETURNING lease_id
            "#,
        )
        .bind(lease_id.0)
        .bind(owner)
        .bind(ttl_millis(ttl))
        .fetch_optional(self.pool())
        .await
        .map_err(|e| {
            CoreError::Database(format!("Failed to acquire run lease: {e}"))
        })?;

        Ok(claimed == Some(lease_id.0))
    }

    async fn renew(&self, lease_id: LeaseId, ttl: Duration) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE run_lease
            SET lease_expires_at = NOW() + ($2::bigint) * INTERVAL '1 millisecond'
            WHERE id = 1 AND lease_id = $1
            "#,
        )
        .bind(lease_id.0)
        .bind(ttl_millis(ttl))
        .execute(self.pool())
        .await
        .map_err(|e| {
            CoreError::Database(format!("Failed to renew run lease: {e}"))
        })?;

        Ok(result.rows_affected() == 1)
    }

    async fn release(&self, lease_id: LeaseId) -> Result<()> {
        sqlx::query(
            r#"
            DELETE FROM run_lease
            WHERE id = 1 AND lease_id = $1
            "#,
        )
        .bind(lease_id.0)
        .execute(self.pool())
        .await
        .map_err(|e| {
            CoreError::Database(format!("Failed to release run lease: {e}"))
        })?;

        Ok(())
    }

    async fn current(&self) -> Result<Option<RunLeaseRecord>> {
        let row = sqlx::query_as::<_, RunLeaseRow>(
            r#"
            SELECT lease_id, lease_owner, acquired_at, lease_expires_at
            FROM run_lease
            WHERE id = 1 AND lease_expires_at > NOW()
            "#,
        )
        .fetch_optional(self.pool())
        .await
        .map_err(|e| {
            CoreError::Database(format!("Failed to load run lease: {e}"))
        })?;

        Ok(row.map(RunLeaseRecord::from))
    }
}

#[derive(sqlx::FromRow)]
struct RunLeaseRow {
    lease_id: Uuid,
    lease_owner: String,
    acquired_at: DateTime<Utc>,
    lease_expires_at: DateTime<Utc>,
}

impl From<RunLeaseRow> for RunLeaseRecord {
    fn from(row: RunLeaseRow) -> Self {
        Self {
            lease_id: LeaseId(row.lease_id),
            lease_owner: row.lease_owner,
            acquired_at: row.acquired_at,
            expires_at: row.lease_expires_at,
        }
    }
}
