use lifecheck_model::ModelError;
use thiserror::Error;

use crate::providers::ProviderError;
use crate::scheduling::validation::ScheduleValidationError;

/// Errors raised by the stores, registries and the orchestrator.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid stored value: {0}")]
    Model(#[from] ModelError),

    #[error("Registry error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(#[from] ScheduleValidationError),

    #[error("Verification did not converge: {remaining} subjects still pending")]
    NotConverged { remaining: i64 },

    #[error("Run lease lost: {0}")]
    LeaseLost(String),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
