use async_trait::async_trait;
use chrono::NaiveTime;
use lifecheck_model::ScheduleWindow;
use sqlx::PgPool;

use crate::{
    database::ports::schedule::ScheduleRepository,
    error::{CoreError, Result},
};

#[derive(Clone, Debug)]
pub struct PostgresScheduleRepository {
    pool: PgPool,
}

impl PostgresScheduleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ScheduleRepository for PostgresScheduleRepository {
    async fn list_windows(&self) -> Result<Vec<ScheduleWindow>> {
        let rows = sqlx::query_as::<_, ScheduleWindowRow>(
            r#"
            SELECT month, day, start_time, duration_hours
            FROM schedule_windows
            ORDER BY month, day, start_time
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            CoreError::Database(format!("Failed to load schedule windows: {e}"))
        })?;

        Ok(rows.into_iter().map(ScheduleWindow::from).collect())
    }

    async fn replace_windows(&self, windows: Vec<ScheduleWindow>) -> Result<()> {
        let mut tx = self.pool().begin().await.map_err(|e| {
            CoreError::Database(format!("Failed to start transaction: {e}"))
        })?;

        sqlx::query("DELETE FROM schedule_windows")
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                CoreError::Database(format!(
                    "Failed to clear schedule windows: {e}"
                ))
            })?;

        for window in &windows {
            sqlx::query(
                r#"
                INSERT INTO schedule_windows (month, day, start_time, duration_hours)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(window.month as i16)
            .bind(window.day as i16)
            .bind(window.start_time)
            .bind(window.duration_hours as i16)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                CoreError::Database(format!(
                    "Failed to insert schedule window {window}: {e}"
                ))
            })?;
        }

        tx.commit().await.map_err(|e| {
            CoreError::Database(format!(
                "Failed to commit schedule replacement: {e}"
            ))
        })?;

        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct ScheduleWindowRow {
    month: i16,
    day: i16,
    start_time: NaiveTime,
    duration_hours: i16,
}

impl From<ScheduleWindowRow> for ScheduleWindow {
    fn from(row: ScheduleWindowRow) -> Self {
        // Table CHECK constraints keep these non-negative.
        ScheduleWindow {
            month: row.month.max(0) as u32,
            day: row.day.max(0) as u32,
            start_time: row.start_time,
            duration_hours: row.duration_hours.max(0) as u32,
        }
    }
}
