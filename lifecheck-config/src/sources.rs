use std::path::PathBuf;

use lifecheck_core::orchestration::OrchestratorConfig;
use serde::{Deserialize, Serialize};

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    /// `[database]` table.
    #[serde(default)]
    pub database: FileDatabaseConfig,
    /// `[registry]` table.
    #[serde(default)]
    pub registry: FileRegistryConfig,
    /// `[scheduler]` table.
    #[serde(default)]
    pub scheduler: FileSchedulerConfig,
    /// `[orchestrator]` table; defaults apply when absent.
    pub orchestrator: Option<OrchestratorConfig>,
}

/// `[database]` table of the TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileDatabaseConfig {
    /// Primary database URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Census database URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub census_url: Option<String>,
    /// Census selection override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub census_query: Option<String>,
    /// Pool size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
}

/// `[registry]` table of the TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileRegistryConfig {
    /// Population registry check endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub population_url: Option<String>,
    /// Civil registry base URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lk_api_url: Option<String>,
    /// Civil registry job id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lk_job_id: Option<String>,
    /// Token acceptance endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lk_token_check_url: Option<String>,
    /// Humantime duration such as `15s`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
}

/// `[scheduler]` table of the TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileSchedulerConfig {
    /// Humantime tick interval.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tick: Option<String>,
    /// Humantime delay before the first tick.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_delay: Option<String>,
}

/// Environment-derived configuration values.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    /// `LIFECHECK_CONFIG_PATH`.
    pub config_path: Option<PathBuf>,
    /// `DATABASE_URL`.
    pub database_url: Option<String>,
    /// `CENSUS_DATABASE_URL`.
    pub census_database_url: Option<String>,
    /// `CENSUS_QUERY`.
    pub census_query: Option<String>,
    /// `DATABASE_MAX_CONNECTIONS`.
    pub database_max_connections: Option<u32>,
    /// `POPULATION_CHECK_URL`.
    pub population_check_url: Option<String>,
    /// `LK_API_URL`.
    pub lk_api_url: Option<String>,
    /// `LK_JOB_ID`.
    pub lk_job_id: Option<String>,
    /// `LK_TOKEN_CHECK_URL`.
    pub lk_token_check_url: Option<String>,
    /// `REGISTRY_TIMEOUT`.
    pub registry_timeout: Option<String>,
    /// `SCHEDULER_TICK`.
    pub scheduler_tick: Option<String>,
    /// `SCHEDULER_INITIAL_DELAY`.
    pub scheduler_initial_delay: Option<String>,
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl EnvConfig {
    /// Reads every variable; blank values count as unset.
    pub fn gather() -> Self {
        Self {
            config_path: non_empty_var("LIFECHECK_CONFIG_PATH").map(PathBuf::from),
            database_url: non_empty_var("DATABASE_URL"),
            census_database_url: non_empty_var("CENSUS_DATABASE_URL"),
            census_query: non_empty_var("CENSUS_QUERY"),
            database_max_connections: non_empty_var("DATABASE_MAX_CONNECTIONS")
                .and_then(|s| s.parse().ok()),
            population_check_url: non_empty_var("POPULATION_CHECK_URL"),
            lk_api_url: non_empty_var("LK_API_URL"),
            lk_job_id: non_empty_var("LK_JOB_ID"),
            lk_token_check_url: non_empty_var("LK_TOKEN_CHECK_URL"),
            registry_timeout: non_empty_var("REGISTRY_TIMEOUT"),
            scheduler_tick: non_empty_var("SCHEDULER_TICK"),
            scheduler_initial_delay: non_empty_var("SCHEDULER_INITIAL_DELAY"),
        }
    }
}
