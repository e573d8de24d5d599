use async_trait::async_trait;
use lifecheck_model::{CheckKind, LogDetailId, SubjectRecord, VitalCode};
use tracing::{info, warn};

use super::retry::RowCheck;
use crate::database::ports::{
    credentials::CredentialRepository,
    run_state::RunStateRepository,
    subjects::{CheckResolution, SubjectRepository},
};
use crate::error::{CoreError, Result};
use crate::providers::{CivilRecord, CivilRegistry, PopulationRegistry, ProviderError};

/// Population registry check for one subject row.
pub struct PopulationCheck<'a> {
    /// Where resolutions and failures are written.
    pub subjects: &'a dyn SubjectRepository,
    /// Progress counters.
    pub run_state: &'a dyn RunStateRepository,
    /// Registry being queried.
    pub registry: &'a dyn PopulationRegistry,
    /// Progress counter bumped per resolved subject.
    pub detail_id: LogDetailId,
}

impl std::fmt::Debug for PopulationCheck<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PopulationCheck")
            .field("detail_id", &self.detail_id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RowCheck for PopulationCheck<'_> {
    type Row = SubjectRecord;
    type Value = VitalCode;

    async fn call(&self, row: &SubjectRecord, attempt: u16) -> Result<VitalCode> {
        let birth_date = row.birth_date.ok_or_else(|| {
            ProviderError::InvalidRequest(format!(
                "subject {} has no birth date",
                row.id
            ))
        })?;

        tracing::debug!(
            target: "lifecheck::checkpop",
            subject_id = %row.id,
            attempt,
            "querying population registry"
        );
        Ok(self.registry.check(&row.cid, birth_date).await?)
    }

    async fn on_success(&self, row: &SubjectRecord, code: VitalCode) -> Result<()> {
        self.run_state.increment_checked(self.detail_id).await?;
        self.subjects
            .record_resolution(&CheckResolution {
                subject_id: row.id,
                kind: CheckKind::Population,
                code: code.clone(),
                birth_date: None,
            })
            .await?;

        info!(
            target: "lifecheck::checkpop",
            subject_id = %row.id,
            code = %code,
            status = code.subject_status().as_str(),
            "population check resolved"
        );
        Ok(())
    }

    async fn on_failure(&self, row: &SubjectRecord, error: &CoreError) -> Result<()> {
        self.subjects
            .mark_check_failed(row.id, CheckKind::Population)
            .await?;
        warn!(
            target: "lifecheck::checkpop",
            subject_id = %row.id,
            error = %error,
            "population check failed"
        );
        Ok(())
    }
}

/// Civil registry check for one subject row, authorised by the newest
/// active credential at the time of each attempt.
pub struct CivilRegistryCheck<'a> {
    /// Where resolutions and failures are written.
    pub subjects: &'a dyn SubjectRepository,
    /// Progress counters.
    pub run_state: &'a dyn RunStateRepository,
    /// Source of the token for each attempt.
    pub credentials: &'a dyn CredentialRepository,
    /// Registry being queried.
    pub registry: &'a dyn CivilRegistry,
    /// Progress counter bumped per resolved subject.
    pub detail_id: LogDetailId,
}

impl std::fmt::Debug for CivilRegistryCheck<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CivilRegistryCheck")
            .field("detail_id", &self.detail_id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RowCheck for CivilRegistryCheck<'_> {
    type Row = SubjectRecord;
    type Value = CivilRecord;

    async fn call(&self, row: &SubjectRecord, attempt: u16) -> Result<CivilRecord> {
        let credential = self
            .credentials
            .latest_active()
            .await?
            .ok_or(ProviderError::MissingCredential)?;

        tracing::debug!(
            target: "lifecheck::lk",
            subject_id = %row.id,
            attempt,
            "querying civil registry"
        );
        Ok(self.registry.lookup(&row.cid, &credential.token).await?)
    }

    async fn on_success(&self, row: &SubjectRecord, record: CivilRecord) -> Result<()> {
        self.run_state.increment_checked(self.detail_id).await?;
        self.subjects
            .record_resolution(&CheckResolution {
                subject_id: row.id,
                kind: CheckKind::CivilRegistry,
                code: record.status.clone(),
                birth_date: record.date_of_birth,
            })
            .await?;

        info!(
            target: "lifecheck::lk",
            subject_id = %row.id,
            code = %record.status,
            status = record.status.subject_status().as_str(),
            "civil registry check resolved"
        );
        Ok(())
    }

    async fn on_failure(&self, row: &SubjectRecord, error: &CoreError) -> Result<()> {
        self.subjects
            .mark_check_failed(row.id, CheckKind::CivilRegistry)
            .await?;
        warn!(
            target: "lifecheck::lk",
            subject_id = %row.id,
            error = %error,
            "civil registry check failed"
        );
        Ok(())
    }
}
