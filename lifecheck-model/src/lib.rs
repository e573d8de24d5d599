//! Core data model definitions shared across lifecheck crates.
#![allow(missing_docs)]

pub use ::chrono;

pub mod credential;
pub mod dates;
pub mod error;
pub mod ids;
pub mod phase;
pub mod run;
pub mod schedule;
pub mod subject;

// Intentionally curated re-exports for downstream consumers.
pub use credential::{CredentialToken, TokenStatus};
pub use error::{ModelError, Result as ModelResult};
pub use ids::{LogDetailId, LogRunId, SubjectId};
pub use phase::RunPhase;
pub use run::{
    LogDetail, LogRun, RunOutcome, RunResult, RunState, RunStatusReport,
};
pub use schedule::{LooseInteger, ScheduleWindow, ScheduleWindowInput};
pub use subject::{
    CensusRecord, CheckKind, CheckStatus, NewSubject, SubjectRecord,
    SubjectStatus, VitalCode,
};
