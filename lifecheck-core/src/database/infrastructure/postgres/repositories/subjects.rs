use async_trait::async_trait;
use chrono::NaiveDate;
use lifecheck_model::{
    CheckKind, CheckStatus, NewSubject, SubjectId, SubjectRecord,
    SubjectStatus,
};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::{
    database::ports::subjects::{CheckResolution, SubjectRepository},
    error::{CoreError, Result},
};

/// Rows per INSERT statement; keeps bind parameters well under the
/// PostgreSQL limit of 65535.
const INSERT_CHUNK: usize = 5_000;

#[derive(Clone, Debug)]
pub struct PostgresSubjectRepository {
    pool: PgPool,
}

impl PostgresSubjectRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn pending_filter(kind: CheckKind) -> &'static str {
    match kind {
        CheckKind::Population => {
            "status = 'PENDING' AND status_checkpop = 'PENDING'"
        }
        CheckKind::CivilRegistry => {
            "status = 'PENDING' AND status_lk = 'PENDING'"
        }
    }
}

fn remaining_filter(kind: CheckKind) -> &'static str {
    match kind {
        CheckKind::Population => "status_checkpop = 'PENDING'",
        CheckKind::CivilRegistry => {
            "status = 'PENDING' AND status_lk = 'PENDING'"
        }
    }
}

#[async_trait]
impl SubjectRepository for PostgresSubjectRepository {
    async fn replace_all(&self, subjects: Vec<NewSubject>) -> Result<u64> {
        let mut tx = self.pool().begin().await.map_err(|e| {
            CoreError::Database(format!("Failed to start transaction: {e}"))
        })?;

        sqlx::query("DELETE FROM subjects")
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                CoreError::Database(format!("Failed to clear subjects: {e}"))
            })?;

        let mut inserted = 0u64;
        for chunk in subjects.chunks(INSERT_CHUNK) {
            let mut builder = QueryBuilder::<Postgres>::new(
                "INSERT INTO subjects (cid, birth_date, member_code, status, status_checkpop, status_lk) ",
            );
            builder.push_values(chunk, |mut row, subject| {
                row.push_bind(&subject.cid)
                    .push_bind(subject.birth_date)
                    .push_bind(&subject.member_code)
                    .push_bind(SubjectStatus::Pending.as_str())
                    .push_bind(subject.status_checkpop.as_db())
                    .push_bind(CheckStatus::PENDING);
            });

            let result =
                builder.build().execute(&mut *tx).await.map_err(|e| {
                    CoreError::Database(format!(
                        "Failed to insert subjects: {e}"
                    ))
                })?;
            inserted += result.rows_affected();
        }

        tx.commit().await.map_err(|e| {
            CoreError::Database(format!(
                "Failed to commit subject replacement: {e}"
            ))
        })?;

        Ok(inserted)
    }

    async fn pending_for(&self, kind: CheckKind) -> Result<Vec<SubjectRecord>> {
        let sql = format!(
            r#"
            SELECT id, cid, birth_date, member_code, status,
                   status_checkpop, status_lk
            FROM subjects
            WHERE {}
            ORDER BY id ASC
            "#,
            pending_filter(kind)
        );

        let rows = sqlx::query_as::<_, SubjectRow>(&sql)
            .fetch_all(self.pool())
            .await
            .map_err(|e| {
                CoreError::Database(format!(
                    "Failed to load pending {kind} subjects: {e}"
                ))
            })?;

        rows.into_iter().map(SubjectRecord::try_from).collect()
    }

    async fn count_remaining(&self, kind: CheckKind) -> Result<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM subjects WHERE {}",
            remaining_filter(kind)
        );

        sqlx::query_scalar::<_, i64>(&sql)
            .fetch_one(self.pool())
            .await
            .map_err(|e| {
                CoreError::Database(format!(
                    "Failed to count remaining {kind} subjects: {e}"
                ))
            })
    }

    async fn record_resolution(&self, resolution: &CheckResolution) -> Result<()> {
        let sql = format!(
            r#"
            UPDATE subjects
            SET {} = $2,
                status = $3,
                birth_date = COALESCE($4, birth_date),
                updated_at = NOW()
            WHERE id = $1
            "#,
            resolution.kind.column()
        );

        sqlx::query(&sql)
            .bind(resolution.subject_id.get())
            .bind(resolution.code.as_code())
            .bind(resolution.code.subject_status().as_str())
            .bind(resolution.birth_date)
            .execute(self.pool())
            .await
            .map_err(|e| {
                CoreError::Database(format!(
                    "Failed to record {} result for subject {}: {e}",
                    resolution.kind, resolution.subject_id
                ))
            })?;

        Ok(())
    }

    async fn mark_check_failed(
        &self,
        subject_id: SubjectId,
        kind: CheckKind,
    ) -> Result<()> {
        let sql = format!(
            "UPDATE subjects SET {} = $2, updated_at = NOW() WHERE id = $1",
            kind.column()
        );

        sqlx::query(&sql)
            .bind(subject_id.get())
            .bind(CheckStatus::FAILED)
            .execute(self.pool())
            .await
            .map_err(|e| {
                CoreError::Database(format!(
                    "Failed to mark {kind} check failed for subject {subject_id}: {e}"
                ))
            })?;

        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct SubjectRow {
    id: i64,
    cid: String,
    birth_date: Option<NaiveDate>,
    member_code: String,
    status: String,
    status_checkpop: String,
    status_lk: String,
}

impl TryFrom<SubjectRow> for SubjectRecord {
    type Error = CoreError;

    fn try_from(row: SubjectRow) -> Result<Self> {
        Ok(SubjectRecord {
            id: SubjectId(row.id),
            cid: row.cid,
            birth_date: row.birth_date,
            member_code: row.member_code,
            status: SubjectStatus::parse(&row.status)?,
            status_checkpop: CheckStatus::from_db(&row.status_checkpop),
            status_lk: CheckStatus::from_db(&row.status_lk),
        })
    }
}
