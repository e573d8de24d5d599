use async_trait::async_trait;
use lifecheck_model::CensusRecord;

use crate::error::Result;

/// Read-only view of the member census that seeds every attempt.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CensusSource: Send + Sync {
    async fn fetch_active_members(&self) -> Result<Vec<CensusRecord>>;
}
