use async_trait::async_trait;
use chrono::NaiveDate;
use lifecheck_model::{CheckKind, NewSubject, SubjectId, SubjectRecord, VitalCode};

use crate::error::Result;

/// Successful answer of one registry for one subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResolution {
    pub subject_id: SubjectId,
    pub kind: CheckKind,
    pub code: VitalCode,
    /// Replaces the stored birth date when the registry reported one.
    pub birth_date: Option<NaiveDate>,
}

/// Subject table access for the census replacement and both checks.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubjectRepository: Send + Sync {
    /// Deletes every subject and inserts `subjects` in one transaction.
    async fn replace_all(&self, subjects: Vec<NewSubject>) -> Result<u64>;

    /// Rows that still need `kind` checked.
    async fn pending_for(&self, kind: CheckKind) -> Result<Vec<SubjectRecord>>;

    /// Number of rows the convergence loop still considers open for `kind`.
    async fn count_remaining(&self, kind: CheckKind) -> Result<i64>;

    async fn record_resolution(&self, resolution: &CheckResolution) -> Result<()>;

    /// Marks `kind` as FAILED for one subject; the overall status is untouched.
    async fn mark_check_failed(
        &self,
        subject_id: SubjectId,
        kind: CheckKind,
    ) -> Result<()>;
}
