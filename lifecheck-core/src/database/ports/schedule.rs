use async_trait::async_trait;
use lifecheck_model::ScheduleWindow;

use crate::error::Result;

/// Stored schedule windows.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    async fn list_windows(&self) -> Result<Vec<ScheduleWindow>>;

    /// Replaces the whole window set atomically.
    async fn replace_windows(&self, windows: Vec<ScheduleWindow>) -> Result<()>;
}
