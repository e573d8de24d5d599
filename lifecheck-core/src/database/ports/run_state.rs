use async_trait::async_trait;
use lifecheck_model::{
    LogDetail, LogDetailId, LogRun, LogRunId, RunPhase, RunState,
};

use crate::error::Result;

/// Persisted pipeline phase and the run log.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RunStateRepository: Send + Sync {
    /// Reads the singleton run state; `None` when it was never seeded.
    async fn load_state(&self) -> Result<Option<RunState>>;

    /// Opens a new batch attempt.
    async fn create_log_run(&self) -> Result<LogRunId>;

    /// Persists `phase` on the run state and the log run, and appends a new
    /// log detail for it. All three writes commit together.
    async fn record_transition(
        &self,
        log_id: LogRunId,
        phase: RunPhase,
        row_count: Option<i64>,
    ) -> Result<LogDetailId>;

    /// Bumps the progress counter of a phase entry by one.
    async fn increment_checked(&self, detail_id: LogDetailId) -> Result<()>;

    /// Records the last error of an attempt without touching its phase.
    async fn record_failure(
        &self,
        log_id: LogRunId,
        phase: RunPhase,
        message: &str,
    ) -> Result<()>;

    async fn log_details(&self, log_id: LogRunId) -> Result<Vec<LogDetail>>;

    /// Most recent attempts first.
    async fn list_runs(&self, limit: i64) -> Result<Vec<LogRun>>;
}
