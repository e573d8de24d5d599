//! PostgreSQL-backed repository implementations.

pub mod credentials;
pub mod run_lease;
pub mod run_state;
pub mod schedule;
pub mod subjects;
