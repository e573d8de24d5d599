use std::{fmt, time::Duration};

use sqlx::{
    PgPool,
    postgres::{PgConnectOptions, PgPoolOptions},
};
use tracing::info;

use crate::{
    database::infrastructure::postgres::{
        PostgresCensusSource, PostgresCredentialRepository,
        PostgresRunLeaseRepository, PostgresRunStateRepository, PostgresScheduleRepository,
        PostgresSubjectRepository,
    },
    error::{CoreError, Result},
};

/// Statistics about the connection pool
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub size: u32,
    pub idle: u32,
    pub max_size: u32,
    pub min_idle: u32,
}

/// Connection pool sizing.
#[derive(Debug, Clone, Copy)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

async fn connect_pool(
    connection_string: &str,
    settings: PoolSettings,
) -> Result<PgPool> {
    let connect_options: PgConnectOptions =
        connection_string.parse().map_err(|e| {
            CoreError::Database(format!("Invalid database URL: {e}"))
        })?;

    PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(settings.acquire_timeout)
        .max_lifetime(Duration::from_secs(1800))
        .idle_timeout(Duration::from_secs(600))
        .test_before_acquire(true)
        .connect_with(connect_options)
        .await
        .map_err(|e| {
            CoreError::Database(format!("Database connection failed: {e}"))
        })
}

/// Primary store: subjects, run state, logs, schedule and credentials.
#[derive(Clone)]
pub struct PostgresDatabase {
    pool: PgPool,
    settings: PoolSettings,
    run_state: PostgresRunStateRepository,
    run_lease: PostgresRunLeaseRepository,
    subjects: PostgresSubjectRepository,
    schedule: PostgresScheduleRepository,
    credentials: PostgresCredentialRepository,
}

impl fmt::Debug for PostgresDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresDatabase")
            .field("pool_size", &self.pool.size())
            .field("idle_connections", &self.pool.num_idle())
            .field("max_connections", &self.settings.max_connections)
            .field("min_connections", &self.settings.min_connections)
            .finish()
    }
}

impl PostgresDatabase {
    pub async fn new(
        connection_string: &str,
        settings: PoolSettings,
    ) -> Result<Self> {
        let pool = connect_pool(connection_string, settings).await?;

        info!(
            max_connections = settings.max_connections,
            min_connections = settings.min_connections,
            "database pool initialized"
        );

        Ok(Self::from_pool(pool, settings))
    }

    /// Wraps an existing pool; used by `#[sqlx::test]` fixtures.
    pub fn from_pool(pool: PgPool, settings: PoolSettings) -> Self {
        Self {
            run_state: PostgresRunStateRepository::new(pool.clone()),
            run_lease: PostgresRunLeaseRepository::new(pool.clone()),
            subjects: PostgresSubjectRepository::new(pool.clone()),
            schedule: PostgresScheduleRepository::new(pool.clone()),
            credentials: PostgresCredentialRepository::new(pool.clone()),
            pool,
            settings,
        }
    }

    /// Applies pending migrations.
    pub async fn initialize_schema(&self) -> Result<()> {
        crate::MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| CoreError::Database(format!("Migration failed: {e}")))?;

        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            size: self.pool.size(),
            idle: self.pool.num_idle() as u32,
            max_size: self.settings.max_connections,
            min_idle: self.settings.min_connections,
        }
    }

    pub fn run_state(&self) -> &PostgresRunStateRepository {
        &self.run_state
    }

    pub fn run_lease(&self) -> &PostgresRunLeaseRepository {
        &self.run_lease
    }

    pub fn subjects(&self) -> &PostgresSubjectRepository {
        &self.subjects
    }

    pub fn schedule(&self) -> &PostgresScheduleRepository {
        &self.schedule
    }

    pub fn credentials(&self) -> &PostgresCredentialRepository {
        &self.credentials
    }
}

/// Opens a read-only census reader on its own pool. `query` replaces the
/// default selection when set.
pub async fn connect_census(
    connection_string: &str,
    settings: PoolSettings,
    query: Option<&str>,
) -> Result<PostgresCensusSource> {
    let pool = connect_pool(connection_string, settings).await?;
    let source = PostgresCensusSource::new(pool);
    let source = match query {
        Some(query) => {
            info!("census source pool initialized with a custom query");
            source.with_query(query)
        }
        None => {
            info!("census source pool initialized");
            source
        }
    };
    Ok(source)
}
