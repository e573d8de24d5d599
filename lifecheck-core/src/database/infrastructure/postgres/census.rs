use async_trait::async_trait;
use chrono::NaiveDate;
use lifecheck_model::CensusRecord;
use sqlx::PgPool;

use crate::{
    database::ports::census::CensusSource,
    error::{CoreError, Result},
};

/// Active members: live records with a 13 character citizen id that are not
/// flagged as removed (`member_status = 99`).
pub const DEFAULT_CENSUS_QUERY: &str = r#"
    SELECT member_code, id_card AS cid, birth_date
    FROM mas_members
    WHERE record_status = 'N'
      AND length(id_card) = 13
      AND member_status <> 99
"#;

/// Census reader backed by its own PostgreSQL pool.
#[derive(Clone, Debug)]
pub struct PostgresCensusSource {
    pool: PgPool,
    query: String,
}

impl PostgresCensusSource {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            query: DEFAULT_CENSUS_QUERY.to_string(),
        }
    }

    /// Overrides the selection query. It must yield `member_code`, `cid`
    /// and `birth_date` columns.
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CensusSource for PostgresCensusSource {
    async fn fetch_active_members(&self) -> Result<Vec<CensusRecord>> {
        let rows = sqlx::query_as::<_, CensusRow>(&self.query)
            .fetch_all(self.pool())
            .await
            .map_err(|e| {
                CoreError::Database(format!("Failed to read census source: {e}"))
            })?;

        Ok(rows.into_iter().map(CensusRecord::from).collect())
    }
}

#[derive(sqlx::FromRow)]
struct CensusRow {
    member_code: String,
    cid: String,
    birth_date: Option<NaiveDate>,
}

impl From<CensusRow> for CensusRecord {
    fn from(row: CensusRow) -> Self {
        CensusRecord {
            cid: row.cid.trim().to_string(),
            birth_date: row.birth_date,
            member_code: row.member_code,
        }
    }
}
