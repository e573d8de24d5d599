use std::fmt::{self, Display};

/// Errors produced by model constructors and parsing routines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    UnknownPhase(i16),
    InvalidStatus(String),
    InvalidTime(String),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::UnknownPhase(code) => {
                write!(f, "unknown run phase code: {code}")
            }
            ModelError::InvalidStatus(raw) => {
                write!(f, "invalid status value: {raw}")
            }
            ModelError::InvalidTime(raw) => {
                write!(f, "invalid time of day: {raw}")
            }
        }
    }
}

impl std::error::Error for ModelError {}

pub type Result<T> = std::result::Result<T, ModelError>;
