use chrono::{DateTime, Utc};

use crate::ids::{LogDetailId, LogRunId};
use crate::phase::RunPhase;

/// Singleton row describing where the pipeline currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunState {
    pub phase: RunPhase,
    pub log_id: Option<LogRunId>,
}

/// One batch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LogRun {
    pub id: LogRunId,
    pub phase: RunPhase,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub failed_at: Option<DateTime<Utc>>,
}

/// One phase entry inside a batch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LogDetail {
    pub id: LogDetailId,
    pub log_id: LogRunId,
    pub phase: RunPhase,
    /// Row count recorded when the phase was entered (e.g. subjects pulled).
    pub row_count: Option<i64>,
    /// Subjects successfully checked while this phase was active.
    pub checked_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Observable status of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunStatusReport {
    pub is_processing: bool,
    pub phase: Option<RunPhase>,
    pub log_id: Option<LogRunId>,
    pub details: Vec<LogDetail>,
}

/// How a call to the orchestrator ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RunOutcome {
    AlreadyRunning,
    StoppedByWindow,
    NoStateFound,
    Done,
    ProcessingError,
}

impl RunOutcome {
    pub fn message(self) -> &'static str {
        match self {
            RunOutcome::AlreadyRunning => "Processing already running.",
            RunOutcome::StoppedByWindow => "Stopped by schedule window.",
            RunOutcome::NoStateFound => "No state found.",
            RunOutcome::Done => "Processing done.",
            RunOutcome::ProcessingError => "Processing error.",
        }
    }

    pub fn is_ok(self) -> bool {
        !matches!(self, RunOutcome::ProcessingError)
    }

    pub fn status_code(self) -> u16 {
        if self.is_ok() { 200 } else { 500 }
    }
}

/// Wire shape of a run result.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunResult {
    pub ok: bool,
    pub state: String,
    pub code: u16,
}

impl From<RunOutcome> for RunResult {
    fn from(outcome: RunOutcome) -> Self {
        Self {
            ok: outcome.is_ok(),
            state: outcome.message().to_string(),
            code: outcome.status_code(),
        }
    }
}
