use async_trait::async_trait;
use chrono::NaiveDate;
use lifecheck_model::VitalCode;

use super::ProviderError;

/// Population registry lookup keyed by citizen id and birth date.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PopulationRegistry: Send + Sync {
    async fn check(
        &self,
        cid: &str,
        birth_date: NaiveDate,
    ) -> Result<VitalCode, ProviderError>;
}

/// Answer of the civil registry for one person.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CivilRecord {
    pub status: VitalCode,
    /// Registry birth date when it parsed as a full calendar day.
    pub date_of_birth: Option<NaiveDate>,
}

/// Civil registry ("LK2") lookups authorised by an operator bearer token.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CivilRegistry: Send + Sync {
    async fn lookup(
        &self,
        cid: &str,
        token: &str,
    ) -> Result<CivilRecord, ProviderError>;

    /// Whether the registry currently accepts `token`. Transport failures
    /// count as "not accepted".
    async fn token_accepted(&self, token: &str) -> bool;
}
