use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::orchestration::lease::LeaseId;

/// Live holder of the shared run lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLeaseRecord {
    /// Claim held by the run.
    pub lease_id: LeaseId,
    /// Who started the run.
    pub lease_owner: String,
    /// When the claim was made.
    pub acquired_at: DateTime<Utc>,
    /// When the claim lapses unless renewed.
    pub expires_at: DateTime<Utc>,
}

/// Store-backed lease that keeps batch runs exclusive across processes.
///
/// A holder that stops renewing loses the lease once `ttl` passes, so a
/// crashed process cannot block later runs forever.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RunLeaseRepository: Send + Sync {
    /// Claims the lease when it is free or expired. `false` means another
    /// holder is still live.
    async fn try_acquire(
        &self,
        lease_id: LeaseId,
        owner: &str,
        ttl: Duration,
    ) -> Result<bool>;

    /// Extends the lease to `now + ttl`; `false` once it was lost.
    async fn renew(&self, lease_id: LeaseId, ttl: Duration) -> Result<bool>;

    /// Frees the lease if `lease_id` still holds it.
    async fn release(&self, lease_id: LeaseId) -> Result<()>;

    async fn current(&self) -> Result<Option<RunLeaseRecord>>;
}
