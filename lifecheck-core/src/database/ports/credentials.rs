use async_trait::async_trait;
use lifecheck_model::CredentialToken;

use crate::error::Result;

/// Civil registry tokens delivered by operator logins.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialRepository: Send + Sync {
    /// Most recently updated token whose status counts as active.
    async fn latest_active(&self) -> Result<Option<CredentialToken>>;

    /// Inserts or replaces the token held for `token.subject_id`.
    async fn upsert(&self, token: &CredentialToken) -> Result<()>;
}
