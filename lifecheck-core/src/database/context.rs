use std::fmt;
use std::sync::Arc;

use crate::database::PostgresDatabase;
use crate::database::ports::{
    census::CensusSource, credentials::CredentialRepository,
    run_lease::RunLeaseRepository, run_state::RunStateRepository, schedule::ScheduleRepository,
    subjects::SubjectRepository,
};

/// Bundles the repository ports the orchestrator and scheduler depend on.
#[derive(Clone)]
pub struct DatabaseContext {
    run_state: Arc<dyn RunStateRepository>,
    run_lease: Arc<dyn RunLeaseRepository>,
    subjects: Arc<dyn SubjectRepository>,
    schedule: Arc<dyn ScheduleRepository>,
    credentials: Arc<dyn CredentialRepository>,
    census: Arc<dyn CensusSource>,
}

impl fmt::Debug for DatabaseContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseContext")
            .field("run_state_ptr", &Arc::as_ptr(&self.run_state))
            .field("run_lease_ptr", &Arc::as_ptr(&self.run_lease))
            .field("subjects_ptr", &Arc::as_ptr(&self.subjects))
            .field("schedule_ptr", &Arc::as_ptr(&self.schedule))
            .field("credentials_ptr", &Arc::as_ptr(&self.credentials))
            .field("census_ptr", &Arc::as_ptr(&self.census))
            .finish()
    }
}

impl DatabaseContext {
    pub fn new(
        run_state: Arc<dyn RunStateRepository>,
        run_lease: Arc<dyn RunLeaseRepository>,
        subjects: Arc<dyn SubjectRepository>,
        schedule: Arc<dyn ScheduleRepository>,
        credentials: Arc<dyn CredentialRepository>,
        census: Arc<dyn CensusSource>,
    ) -> Self {
        Self {
            run_state,
            run_lease,
            subjects,
            schedule,
            credentials,
            census,
        }
    }

    /// Compose a context from the primary Postgres adapter and a census reader.
    pub fn from_postgres(
        postgres: &PostgresDatabase,
        census: Arc<dyn CensusSource>,
    ) -> Self {
        Self::new(
            Arc::new(postgres.run_state().clone()),
            Arc::new(postgres.run_lease().clone()),
            Arc::new(postgres.subjects().clone()),
            Arc::new(postgres.schedule().clone()),
            Arc::new(postgres.credentials().clone()),
            census,
        )
    }

    pub fn run_state(&self) -> &dyn RunStateRepository {
        self.run_state.as_ref()
    }

    pub fn run_lease(&self) -> &dyn RunLeaseRepository {
        self.run_lease.as_ref()
    }

    pub fn subjects(&self) -> &dyn SubjectRepository {
        self.subjects.as_ref()
    }

    pub fn schedule(&self) -> &dyn ScheduleRepository {
        self.schedule.as_ref()
    }

    pub fn credentials(&self) -> &dyn CredentialRepository {
        self.credentials.as_ref()
    }

    pub fn census(&self) -> &dyn CensusSource {
        self.census.as_ref()
    }

    /// Shared handle for components that outlive a borrow, such as the
    /// scheduler loop.
    pub fn schedule_handle(&self) -> Arc<dyn ScheduleRepository> {
        Arc::clone(&self.schedule)
    }

    pub fn run_state_handle(&self) -> Arc<dyn RunStateRepository> {
        Arc::clone(&self.run_state)
    }
}
