use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::models::{
    Config, ConfigMetadata, DatabaseConfig, RegistryConfig, SchedulerSettings,
};
use crate::sources::{EnvConfig, FileConfig};
use crate::validation::{self, ConfigWarnings};

const DEFAULT_CONFIG_LOCATIONS: [&str; 2] =
    ["lifecheck.toml", "config/lifecheck.toml"];

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_REGISTRY_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_SCHEDULER_TICK: Duration = Duration::from_secs(60);
const DEFAULT_SCHEDULER_INITIAL_DELAY: Duration = Duration::from_secs(5);

/// Result of loading configuration.
#[derive(Debug)]
pub struct ConfigLoad {
    /// Resolved values.
    pub config: Config,
    /// Problems worth logging at startup.
    pub warnings: ConfigWarnings,
}

/// Overrides for file discovery.
#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    /// Config file to read instead of the default locations.
    pub config_path: Option<PathBuf>,
    /// `.env` file to apply instead of the one in the working directory.
    pub env_file: Option<PathBuf>,
}

/// Loads `.env`, environment variables and the TOML file into a [`Config`].
#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

impl ConfigLoader {
    /// Loader with default discovery.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader with explicit overrides.
    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    /// Reads `path` instead of searching the default locations.
    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    /// Applies `path` instead of `./.env`.
    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    /// Applies `.env`, reads the process environment and the config file.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(
                |err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                },
            )?,
            None => {
                dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                })?
            }
        };

        let mut load = self.load_with_env(EnvConfig::gather())?;
        load.config.metadata.env_file_loaded = env_file_loaded;
        Ok(load)
    }

    /// Same as [`load`](Self::load) but with an explicit environment and
    /// without touching `.env`.
    pub fn load_with_env(
        &self,
        env: EnvConfig,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        let (file_config, config_path) = self.load_file_config(&env)?;
        let (config, warnings) = compose_config(file_config, env, config_path)?;
        Ok(ConfigLoad { config, warnings })
    }

    fn load_file_config(
        &self,
        env: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let (path, explicit) = match (&self.options.config_path, &env.config_path)
        {
            (Some(path), _) | (None, Some(path)) => (Some(path.clone()), true),
            (None, None) => (
                DEFAULT_CONFIG_LOCATIONS
                    .iter()
                    .map(PathBuf::from)
                    .find(|candidate| candidate.exists()),
                false,
            ),
        };

        let Some(path) = path else {
            return Ok((None, None));
        };
        if !path.exists() {
            if explicit {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            return Ok((None, None));
        }

        let contents =
            fs::read_to_string(&path).map_err(|source| ConfigLoadError::Io {
                path: path.clone(),
                source,
            })?;
        let file_config: FileConfig =
            toml::from_str(&contents).map_err(|source| {
                ConfigLoadError::Parse {
                    path: path.clone(),
                    source,
                }
            })?;

        Ok((Some(file_config), Some(path)))
    }
}

fn compose_config(
    file_config: Option<FileConfig>,
    env: EnvConfig,
    config_path: Option<PathBuf>,
) -> Result<(Config, ConfigWarnings), ConfigLoadError> {
    let mut warnings = ConfigWarnings::default();

    if config_path.is_none() {
        warnings.push_with_hint(
            "No lifecheck.toml detected; using environment variables and defaults",
            "Set LIFECHECK_CONFIG_PATH to tune retries and rounds",
        );
    }

    let FileConfig {
        database: file_database,
        registry: file_registry,
        scheduler: file_scheduler,
        orchestrator: file_orchestrator,
    } = file_config.unwrap_or_default();

    let database = DatabaseConfig {
        primary_url: env.database_url.or(file_database.url),
        census_url: env.census_database_url.or(file_database.census_url),
        census_query: env.census_query.or(file_database.census_query),
        max_connections: env
            .database_max_connections
            .or(file_database.max_connections)
            .unwrap_or(DEFAULT_MAX_CONNECTIONS),
    };

    let registry = RegistryConfig {
        population_url: parse_url(
            "POPULATION_CHECK_URL",
            env.population_check_url.or(file_registry.population_url),
        )?,
        civil_api_url: parse_url(
            "LK_API_URL",
            env.lk_api_url.or(file_registry.lk_api_url),
        )?,
        civil_job_id: env.lk_job_id.or(file_registry.lk_job_id),
        civil_token_check_url: parse_url(
            "LK_TOKEN_CHECK_URL",
            env.lk_token_check_url.or(file_registry.lk_token_check_url),
        )?,
        timeout: parse_duration(
            "REGISTRY_TIMEOUT",
            env.registry_timeout.or(file_registry.timeout),
        )?
        .unwrap_or(DEFAULT_REGISTRY_TIMEOUT),
    };

    let scheduler = SchedulerSettings {
        tick_interval: parse_duration(
            "SCHEDULER_TICK",
            env.scheduler_tick.or(file_scheduler.tick),
        )?
        .unwrap_or(DEFAULT_SCHEDULER_TICK),
        initial_delay: parse_duration(
            "SCHEDULER_INITIAL_DELAY",
            env.scheduler_initial_delay.or(file_scheduler.initial_delay),
        )?
        .unwrap_or(DEFAULT_SCHEDULER_INITIAL_DELAY),
    };
    if scheduler.tick_interval.is_zero() {
        return Err(ConfigLoadError::InvalidValue {
            key: "SCHEDULER_TICK",
            reason: "must be greater than zero".into(),
        });
    }

    let config = Config {
        database,
        registry,
        scheduler,
        orchestrator: file_orchestrator.unwrap_or_default(),
        metadata: ConfigMetadata {
            config_path,
            env_file_loaded: false,
        },
    };

    warnings.extend(validation::collect_warnings(&config));
    Ok((config, warnings))
}

fn parse_url(
    key: &'static str,
    raw: Option<String>,
) -> Result<Option<Url>, ConfigLoadError> {
    raw.map(|value| {
        Url::parse(value.trim())
            .map_err(|source| ConfigLoadError::InvalidUrl { key, source })
    })
    .transpose()
}

fn parse_duration(
    key: &'static str,
    raw: Option<String>,
) -> Result<Option<Duration>, ConfigLoadError> {
    raw.map(|value| {
        humantime::parse_duration(value.trim())
            .map_err(|source| ConfigLoadError::InvalidDuration { key, source })
    })
    .transpose()
}

impl Config {
    /// Primary database URL, required by every command that touches state.
    pub fn require_database_url(&self) -> Result<&str, ConfigLoadError> {
        self.database
            .primary_url
            .as_deref()
            .ok_or(ConfigLoadError::MissingValue { key: "DATABASE_URL" })
    }

    /// Census database URL, required for the census pull.
    pub fn require_census_url(&self) -> Result<&str, ConfigLoadError> {
        self.database
            .census_url
            .as_deref()
            .ok_or(ConfigLoadError::MissingValue {
                key: "CENSUS_DATABASE_URL",
            })
    }

    /// Path of the TOML file in effect, if any.
    pub fn config_path(&self) -> Option<&Path> {
        self.metadata.config_path.as_deref()
    }
}

/// Fatal configuration problems.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    /// An explicitly requested file does not exist.
    #[error("configuration file missing: {path}")]
    MissingConfig { path: PathBuf },
    /// The file exists but could not be read.
    #[error("failed to read configuration {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid TOML for [`FileConfig`].
    #[error("failed to parse configuration {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    /// A URL setting did not parse.
    #[error("invalid URL in {key}")]
    InvalidUrl {
        key: &'static str,
        #[source]
        source: url::ParseError,
    },
    /// A humantime setting did not parse.
    #[error("invalid duration in {key}")]
    InvalidDuration {
        key: &'static str,
        #[source]
        source: humantime::DurationError,
    },
    /// A setting parsed but is out of range.
    #[error("invalid {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
    /// A required setting is absent.
    #[error("{key} is required")]
    MissingValue { key: &'static str },
    /// The `.env` file is malformed.
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_env() -> EnvConfig {
        EnvConfig {
            database_url: Some("postgres://app@localhost/lifecheck".into()),
            census_database_url: Some("postgres://ro@census/members".into()),
            population_check_url: Some("http://checkpop.local/check".into()),
            lk_api_url: Some("https://lk.local".into()),
            lk_job_id: Some("job-1".into()),
            lk_token_check_url: Some("https://lk.local/api/token".into()),
            ..EnvConfig::default()
        }
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let (config, warnings) =
            compose_config(None, EnvConfig::default(), None).expect("compose");

        assert_eq!(config.registry.timeout, Duration::from_secs(15));
        assert_eq!(config.scheduler.tick_interval, Duration::from_secs(60));
        assert_eq!(config.scheduler.initial_delay, Duration::from_secs(5));
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.orchestrator.retry.max_attempts, 3);
        assert!(config.require_database_url().is_err());
        assert!(warnings.len() >= 5);
    }

    #[test]
    fn environment_wins_over_file() {
        let file: FileConfig = toml::from_str(
            r#"
            [database]
            url = "postgres://file/db"
            max_connections = 4

            [registry]
            timeout = "30s"

            [scheduler]
            tick = "2m"
            "#,
        )
        .expect("toml");

        let env = EnvConfig {
            registry_timeout: Some("5s".into()),
            ..full_env()
        };
        let (config, _) =
            compose_config(Some(file), env, Some(PathBuf::from("lifecheck.toml")))
                .expect("compose");

        assert_eq!(
            config.require_database_url().expect("url"),
            "postgres://app@localhost/lifecheck"
        );
        assert_eq!(config.database.max_connections, 4);
        assert_eq!(config.registry.timeout, Duration::from_secs(5));
        assert_eq!(config.scheduler.tick_interval, Duration::from_secs(120));
    }

    #[test]
    fn census_query_comes_from_file_unless_overridden() {
        let file: FileConfig = toml::from_str(
            r#"
            [database]
            census_query = "SELECT code AS member_code, pid AS cid, dob AS birth_date FROM people"
            "#,
        )
        .expect("toml");

        let (config, _) =
            compose_config(Some(file.clone()), full_env(), None).expect("compose");
        assert!(
            config
                .database
                .census_query
                .as_deref()
                .is_some_and(|q| q.contains("FROM people"))
        );

        let env = EnvConfig {
            census_query: Some("SELECT * FROM census_view".into()),
            ..full_env()
        };
        let (config, _) = compose_config(Some(file), env, None).expect("compose");
        assert_eq!(
            config.database.census_query.as_deref(),
            Some("SELECT * FROM census_view")
        );

        let (config, _) = compose_config(None, full_env(), None).expect("compose");
        assert_eq!(config.database.census_query, None);
    }

    #[test]
    fn fully_configured_environment_has_no_warnings() {
        let (_, warnings) = compose_config(
            None,
            full_env(),
            Some(PathBuf::from("lifecheck.toml")),
        )
        .expect("compose");
        assert!(warnings.is_empty(), "{warnings:?}");
    }

    #[test]
    fn bad_values_are_errors() {
        let env = EnvConfig {
            lk_api_url: Some("not a url".into()),
            ..EnvConfig::default()
        };
        assert!(matches!(
            compose_config(None, env, None),
            Err(ConfigLoadError::InvalidUrl { key: "LK_API_URL", .. })
        ));

        let env = EnvConfig {
            scheduler_tick: Some("soon".into()),
            ..EnvConfig::default()
        };
        assert!(matches!(
            compose_config(None, env, None),
            Err(ConfigLoadError::InvalidDuration { key: "SCHEDULER_TICK", .. })
        ));

        let env = EnvConfig {
            scheduler_tick: Some("0s".into()),
            ..EnvConfig::default()
        };
        assert!(matches!(
            compose_config(None, env, None),
            Err(ConfigLoadError::InvalidValue { key: "SCHEDULER_TICK", .. })
        ));
    }
}
