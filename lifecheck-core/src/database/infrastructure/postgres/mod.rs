//! PostgreSQL adapters for the repository ports.

pub mod census;
pub mod repositories;

pub use census::PostgresCensusSource;
pub use repositories::{
    credentials::PostgresCredentialRepository,
    run_lease::PostgresRunLeaseRepository,
    run_state::PostgresRunStateRepository,
    schedule::PostgresScheduleRepository,
    subjects::PostgresSubjectRepository,
};
