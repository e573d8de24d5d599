use std::path::PathBuf;
use std::time::Duration;

use lifecheck_core::orchestration::OrchestratorConfig;
use url::Url;

/// Fully resolved configuration for one process.
#[derive(Debug, Clone)]
pub struct Config {
    /// Primary and census stores.
    pub database: DatabaseConfig,
    /// External registry endpoints.
    pub registry: RegistryConfig,
    /// Scheduler loop timing.
    pub scheduler: SchedulerSettings,
    /// Retry, convergence, login wait and lease tuning.
    pub orchestrator: OrchestratorConfig,
    /// Where the values came from.
    pub metadata: ConfigMetadata,
}

/// Connection settings for both databases.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// `DATABASE_URL`.
    pub primary_url: Option<String>,
    /// `CENSUS_DATABASE_URL`.
    pub census_url: Option<String>,
    /// Replaces the built-in census selection. Must yield `member_code`,
    /// `cid` and `birth_date`.
    pub census_query: Option<String>,
    /// Pool size for each database.
    pub max_connections: u32,
}

/// Endpoints of the two external registries.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Population registry check endpoint.
    pub population_url: Option<Url>,
    /// Base URL of the civil registry API.
    pub civil_api_url: Option<Url>,
    /// Job id sent with every civil registry lookup.
    pub civil_job_id: Option<String>,
    /// Endpoint probing whether a token is accepted.
    pub civil_token_check_url: Option<Url>,
    /// Per-request timeout for every registry call.
    pub timeout: Duration,
}

/// Timing of the trigger scheduler loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// Pause between two ticks.
    pub tick_interval: Duration,
    /// Delay before the first tick.
    pub initial_delay: Duration,
}

/// Provenance of the loaded values.
#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    /// TOML file in effect.
    pub config_path: Option<PathBuf>,
    /// Whether a `.env` file was applied.
    pub env_file_loaded: bool,
}
