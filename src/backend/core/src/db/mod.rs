//! PostgreSQL connection management.
//!
//! Uses sqlx pools. Startup waits for the server to accept connections
//! before giving up, then applies the embedded migrations.

use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::error::{ErrorCode, GoodsError, Result};
use crate::telemetry::redact_url;

/// Pause between connection attempts while waiting for the server.
const CONNECT_RETRY_PERIOD: Duration = Duration::from_secs(1);

/// Per-attempt acquire timeout.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Pool sizing for one connection target.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub min_connections: u32,
    pub max_lifetime: Duration,
    /// Total time to keep retrying the first connection
    pub connect_timeout: Duration,
}

impl From<&DatabaseConfig> for PoolSettings {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            max_connections: config.max_connections,
            min_connections: config.min_connections,
            max_lifetime: config.max_lifetime,
            connect_timeout: config.connect_timeout,
        }
    }
}

/// Database connection pool.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect, waiting up to `config.connect_timeout` for the server.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = connect_pool(&config.url, &PoolSettings::from(config)).await?;
        Ok(Self { pool })
    }

    /// Run migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| GoodsError::from(sqlx::Error::Migrate(Box::new(e))))?;
        info!("Database migrations applied");
        Ok(())
    }

    /// Get the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Close every connection in the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Open a pool, retrying every second until `settings.connect_timeout` elapses.
pub async fn connect_pool(url: &str, settings: &PoolSettings) -> Result<PgPool> {
    let deadline = Instant::now() + settings.connect_timeout;
    let target = redact_url(url);
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        let result = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .max_lifetime(settings.max_lifetime)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(url)
            .await;

        match result {
            Ok(pool) => {
                info!(target_url = %target, attempt, "Connected to PostgreSQL");
                return Ok(pool);
            }
            Err(e) if Instant::now() + CONNECT_RETRY_PERIOD < deadline => {
                warn!(target_url = %target, attempt, error = %e, "PostgreSQL not ready, retrying");
                tokio::time::sleep(CONNECT_RETRY_PERIOD).await;
            }
            Err(e) => {
                return Err(GoodsError::with_internal(
                    ErrorCode::DatabaseConnectionFailed,
                    "Unable to connect to the database",
                    format!("{} after {} attempts: {}", target, attempt, e),
                )
                .with_source(e));
            }
        }
    }
}
