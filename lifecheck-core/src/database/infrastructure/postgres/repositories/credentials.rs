use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lifecheck_model::{CredentialToken, TokenStatus};
use sqlx::PgPool;

use crate::{
    database::ports::credentials::CredentialRepository,
    error::{CoreError, Result},
};

#[derive(Clone, Debug)]
pub struct PostgresCredentialRepository {
    pool: PgPool,
}

impl PostgresCredentialRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CredentialRepository for PostgresCredentialRepository {
    async fn latest_active(&self) -> Result<Option<CredentialToken>> {
        let row = sqlx::query_as::<_, CredentialRow>(
            r#"
            SELECT subject_id, token, status, updated_at
            FROM credential_tokens
            WHERE status IN ($1, $2)
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(TokenStatus::Active.as_str())
        .bind(TokenStatus::Actived.as_str())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| {
            CoreError::Database(format!("Failed to load active credential: {e}"))
        })?;

        row.map(CredentialToken::try_from).transpose()
    }

    async fn upsert(&self, token: &CredentialToken) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO credential_tokens (subject_id, token, status, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (subject_id) DO UPDATE SET
                token = EXCLUDED.token,
                status = EXCLUDED.status,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&token.subject_id)
        .bind(&token.token)
        .bind(token.status.as_str())
        .bind(token.updated_at)
        .execute(self.pool())
        .await
        .map_err(|e| {
            CoreError::Database(format!("Failed to upsert credential: {e}"))
        })?;

        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
    subject_id: String,
    token: String,
    status: String,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CredentialRow> for CredentialToken {
    type Error = CoreError;

    fn try_from(row: CredentialRow) -> Result<Self> {
        Ok(CredentialToken {
            subject_id: row.subject_id,
            token: row.token,
            status: TokenStatus::parse(&row.status)?,
            updated_at: row.updated_at,
        })
    }
}
