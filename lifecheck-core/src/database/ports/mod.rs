//! Repository ports (interfaces) used by the orchestrator and scheduler.
//! Implementations live in the Postgres adapter under
//! `database::infrastructure::postgres`.

pub mod census;
pub mod credentials;
pub mod run_lease;
pub mod run_state;
pub mod schedule;
pub mod subjects;
