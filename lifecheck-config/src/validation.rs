use std::fmt;

use crate::models::Config;

/// Non-fatal configuration problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    /// What is wrong.
    pub message: String,
    /// How to fix it.
    pub hint: Option<String>,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.hint {
            Some(hint) => write!(f, "{} ({hint})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Ordered list of warnings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigWarnings {
    /// Warnings in the order they were found.
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    /// Adds a warning without a hint.
    pub fn push(&mut self, message: impl Into<String>) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    /// Adds a warning with a fix hint.
    pub fn push_with_hint(
        &mut self,
        message: impl Into<String>,
        hint: impl Into<String>,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    /// Appends all of `other`.
    pub fn extend(&mut self, other: ConfigWarnings) {
        self.items.extend(other.items);
    }

    /// No warnings were found.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of warnings.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Warnings in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ConfigWarning> {
        self.items.iter()
    }
}

/// Checks a composed configuration for settings that will make some
/// commands fail later.
pub fn collect_warnings(config: &Config) -> ConfigWarnings {
    let mut warnings = ConfigWarnings::default();

    if config.database.primary_url.is_none() {
        warnings.push_with_hint(
            "DATABASE_URL is not set; every database command will fail",
            "Set DATABASE_URL or [database].url",
        );
    }
    if config.database.census_url.is_none() {
        warnings.push_with_hint(
            "CENSUS_DATABASE_URL is not set; census pulls will fail",
            "Set CENSUS_DATABASE_URL or [database].census_url",
        );
    }
    if config.registry.population_url.is_none() {
        warnings.push("POPULATION_CHECK_URL is not set; population checks will fail");
    }
    if config.registry.civil_api_url.is_none() {
        warnings.push("LK_API_URL is not set; civil registry checks will fail");
    }
    if config.registry.civil_token_check_url.is_none() {
        warnings.push_with_hint(
            "LK_TOKEN_CHECK_URL is not set; no registry login will ever be accepted",
            "Set LK_TOKEN_CHECK_URL or [registry].lk_token_check_url",
        );
    }
    if config.registry.civil_job_id.is_none() {
        warnings.push("LK_JOB_ID is not set; civil registry requests carry an empty job id");
    }
    if config.orchestrator.retry.max_attempts == 0 {
        warnings.push("orchestrator.retry.max_attempts is 0; one attempt will still be made");
    }

    warnings
}
