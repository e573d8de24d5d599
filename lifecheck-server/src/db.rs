use anyhow::{Context, Result, anyhow};
use lifecheck_config::Config;
use lifecheck_core::database::{PoolSettings, PostgresDatabase};
use url::Url;

/// Rejects URLs that cannot name a PostgreSQL database before a pool is
/// opened against them.
pub fn validate_database_url(raw: &str) -> Result<()> {
    let url = Url::parse(raw).context("invalid PostgreSQL URL")?;
    if !matches!(url.scheme(), "postgres" | "postgresql") {
        return Err(anyhow!(
            "unsupported database scheme `{}`; expected postgres://",
            url.scheme()
        ));
    }
    if url.path().trim_start_matches('/').is_empty() {
        return Err(anyhow!("database URL must include database name"));
    }
    Ok(())
}

pub fn pool_settings(config: &Config) -> PoolSettings {
    PoolSettings {
        max_connections: config.database.max_connections,
        ..PoolSettings::default()
    }
}

/// Connects to the primary store named by `DATABASE_URL`.
pub async fn connect_primary(config: &Config) -> Result<PostgresDatabase> {
    let url = config.require_database_url()?;
    validate_database_url(url)?;
    PostgresDatabase::new(url, pool_settings(config))
        .await
        .context("failed to connect to PostgreSQL")
}
