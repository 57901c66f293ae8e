//! PostgreSQL connection pool management

use std::path::Path;
use std::time::Duration;

use sgc_common::config::{ConfigError, DatabaseConfig};
use sqlx::migrate::{MigrateError, Migrator};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{info, warn};

/// Connection pool settings
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections to maintain
    pub min_connections: u32,
    /// Maximum time to wait for a connection
    pub acquire_timeout: Duration,
    /// Maximum idle time before a connection is closed
    pub idle_timeout: Duration,
    /// Maximum lifetime of a connection
    pub max_lifetime: Duration,
}

impl PoolConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 20,
            min_connections: 2,
            acquire_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(300),
            max_lifetime: Duration::from_secs(1800),
        }
    }

    /// Pool settings from the application database section
    pub fn from_config(config: &DatabaseConfig) -> Result<Self, ConfigError> {
        let url = config
            .url
            .clone()
            .ok_or(ConfigError::MissingVar("DATABASE_URL"))?;
        Ok(Self {
            max_connections: config.max_connections,
            min_connections: config.min_connections.min(config.max_connections),
            ..Self::new(url)
        })
    }
}

/// Create a new PostgreSQL connection pool
pub async fn create_pool(config: &PoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .max_lifetime(config.max_lifetime)
        .connect(&config.url)
        .await
}

/// Apply pending migrations from `dir`.
///
/// A missing directory is skipped with a warning so binaries started outside
/// the repository still boot against an already-migrated database.
pub async fn run_migrations(pool: &PgPool, dir: &str) -> Result<(), MigrateError> {
    let path = Path::new(dir);
    if !path.is_dir() {
        warn!(dir, "Migrations directory not found, skipping");
        return Ok(());
    }

    let migrator = Migrator::new(path).await?;
    migrator.run(pool).await?;
    info!(dir, count = migrator.iter().count(), "Migrations applied");
    Ok(())
}
