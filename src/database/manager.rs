use std::future::Future;
use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;
use tracing::info;

use crate::config::DatabaseConfig;

/// Store outcomes other than success.
///
/// `NotFound`, `EditConflict` and `DuplicateEmail` are expected results a
/// client can act on; the rest are server faults.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("record not found")]
    NotFound,

    #[error("edit conflict")]
    EditConflict,

    #[error("duplicate email")]
    DuplicateEmail,

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Run a store operation under a deadline. Expiry is reported as
/// `DatabaseError::Timeout` and the operation future is dropped.
pub async fn with_timeout<T, F>(limit: Duration, operation: F) -> Result<T, DatabaseError>
where
    F: Future<Output = Result<T, DatabaseError>>,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => Err(DatabaseError::Timeout(limit)),
    }
}

/// Connection pool setup and maintenance
pub struct DatabaseManager;

impl DatabaseManager {
    /// Open a bounded pool and verify connectivity within `connect_timeout`
    pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
        if config.dsn.is_empty() {
            return Err(DatabaseError::ConfigMissing("GREENLIGHT_DB_DSN"));
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.max_open_conns)
            .min_connections(config.max_idle_conns.min(config.max_open_conns))
            .idle_timeout(config.max_idle_time)
            .acquire_timeout(config.connect_timeout)
            .connect_lazy(&config.dsn)?;

        with_timeout(config.connect_timeout, Self::health_check(&pool)).await?;

        info!(
            dsn = %Self::redact_dsn(&config.dsn)?,
            max_open_conns = config.max_open_conns,
            max_idle_conns = config.max_idle_conns,
            "database connection pool established"
        );
        Ok(pool)
    }

    /// Apply the embedded SQL migrations
    pub async fn migrate(pool: &PgPool) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations").run(pool).await?;
        info!("database migrations applied");
        Ok(())
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(pool: &PgPool) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(pool).await?;
        Ok(())
    }

    /// DSN with the password removed, for logging
    pub fn redact_dsn(dsn: &str) -> Result<String, DatabaseError> {
        let mut url = url::Url::parse(dsn).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        if url.password().is_some() {
            url.set_password(Some("xxxxx"))
                .map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        }
        Ok(url.into())
    }
}
