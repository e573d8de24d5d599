use chrono::{DateTime, Utc};

use crate::error::{ModelError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum TokenStatus {
    Active,
    /// Legacy spelling still written by the login callback.
    Actived,
    Expired,
}

impl TokenStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenStatus::Active => "ACTIVE",
            TokenStatus::Actived => "ACTIVED",
            TokenStatus::Expired => "EXPIRED",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(TokenStatus::Active),
            "ACTIVED" => Ok(TokenStatus::Actived),
            "EXPIRED" => Ok(TokenStatus::Expired),
            _ => Err(ModelError::InvalidStatus(raw.to_string())),
        }
    }

    pub fn is_active(self) -> bool {
        matches!(self, TokenStatus::Active | TokenStatus::Actived)
    }
}

/// Bearer credential obtained through the operator login flow.
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CredentialToken {
    pub subject_id: String,
    pub token: String,
    pub status: TokenStatus,
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for CredentialToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialToken")
            .field("subject_id", &self.subject_id)
            .field("token", &"<redacted>")
            .field("status", &self.status)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}
