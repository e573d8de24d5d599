use std::fmt;

use chrono::NaiveDate;

use crate::error::{ModelError, Result};
use crate::ids::SubjectId;

/// Vital status code returned by both registries.
///
/// `0`, `1` and `2` are a fixed external contract; every other code is kept
/// verbatim so operators can inspect it later.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VitalCode {
    Alive,
    Deceased,
    Missing,
    Other(String),
}

impl VitalCode {
    pub fn from_code(raw: &str) -> Self {
        match raw.trim() {
            "0" => VitalCode::Alive,
            "1" => VitalCode::Deceased,
            "2" => VitalCode::Missing,
            other => VitalCode::Other(other.to_string()),
        }
    }

    pub fn as_code(&self) -> &str {
        match self {
            VitalCode::Alive => "0",
            VitalCode::Deceased => "1",
            VitalCode::Missing => "2",
            VitalCode::Other(raw) => raw,
        }
    }

    /// Overall subject status implied by this code.
    pub fn subject_status(&self) -> SubjectStatus {
        match self {
            VitalCode::Alive => SubjectStatus::Alive,
            VitalCode::Deceased => SubjectStatus::Death,
            VitalCode::Missing => SubjectStatus::Lost,
            VitalCode::Other(_) => SubjectStatus::Pending,
        }
    }
}

impl fmt::Display for VitalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

/// Overall status of a subject, stored in `subjects.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum SubjectStatus {
    Pending,
    Alive,
    Death,
    Lost,
    Failed,
}

impl SubjectStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SubjectStatus::Pending => "PENDING",
            SubjectStatus::Alive => "ALIVE",
            SubjectStatus::Death => "DEATH",
            SubjectStatus::Lost => "LOST",
            SubjectStatus::Failed => "FAILED",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "PENDING" => Ok(SubjectStatus::Pending),
            "ALIVE" => Ok(SubjectStatus::Alive),
            "DEATH" => Ok(SubjectStatus::Death),
            "LOST" => Ok(SubjectStatus::Lost),
            "FAILED" => Ok(SubjectStatus::Failed),
            other => Err(ModelError::InvalidStatus(other.to_string())),
        }
    }
}

/// Per-check status stored in `status_checkpop` and `status_lk`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CheckStatus {
    Pending,
    Failed,
    /// The subject cannot be submitted to this check (no birth date).
    Skipped,
    Resolved(VitalCode),
}

impl CheckStatus {
    pub const PENDING: &'static str = "PENDING";
    pub const FAILED: &'static str = "FAILED";
    pub const SKIPPED: &'static str = "SKIPPED";

    pub fn as_db(&self) -> &str {
        match self {
            CheckStatus::Pending => Self::PENDING,
            CheckStatus::Failed => Self::FAILED,
            CheckStatus::Skipped => Self::SKIPPED,
            CheckStatus::Resolved(code) => code.as_code(),
        }
    }

    pub fn from_db(raw: &str) -> Self {
        match raw {
            Self::PENDING => CheckStatus::Pending,
            Self::FAILED => CheckStatus::Failed,
            Self::SKIPPED => CheckStatus::Skipped,
            code => CheckStatus::Resolved(VitalCode::from_code(code)),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, CheckStatus::Pending)
    }
}

/// Which external verification a status column belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckKind {
    Population,
    CivilRegistry,
}

impl CheckKind {
    pub fn column(self) -> &'static str {
        match self {
            CheckKind::Population => "status_checkpop",
            CheckKind::CivilRegistry => "status_lk",
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckKind::Population => f.write_str("population"),
            CheckKind::CivilRegistry => f.write_str("civil-registry"),
        }
    }
}

/// A subject row under verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectRecord {
    pub id: SubjectId,
    pub cid: String,
    pub birth_date: Option<NaiveDate>,
    pub member_code: String,
    pub status: SubjectStatus,
    pub status_checkpop: CheckStatus,
    pub status_lk: CheckStatus,
}

/// Row read from the census source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CensusRecord {
    pub cid: String,
    pub birth_date: Option<NaiveDate>,
    pub member_code: String,
}

/// Row inserted into the subject table during a pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubject {
    pub cid: String,
    pub birth_date: Option<NaiveDate>,
    pub member_code: String,
    pub status_checkpop: CheckStatus,
}

impl From<CensusRecord> for NewSubject {
    fn from(record: CensusRecord) -> Self {
        let status_checkpop = if record.birth_date.is_some() {
            CheckStatus::Pending
        } else {
            CheckStatus::Skipped
        };
        Self {
            cid: record.cid,
            birth_date: record.birth_date,
            member_code: record.member_code,
            status_checkpop,
        }
    }
}
