use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;
use tracing::info;

use crate::config::DatabaseConfig;

/// Errors from the data store and its configuration
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl DatabaseError {
    /// True when the store could not be reached, as opposed to rejecting a query
    pub fn is_unavailable(&self) -> bool {
        match self {
            DatabaseError::ConnectionError(_) => true,
            DatabaseError::Sqlx(err) => matches!(
                err,
                sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::Io(_)
                    | sqlx::Error::Tls(_)
            ),
            _ => false,
        }
    }
}

/// Owns the connection pool for the dataset's database
pub struct DatabaseManager;

impl DatabaseManager {
    /// Build the shared pool. Connections are opened lazily, so startup does
    /// not fail when the store is briefly unavailable.
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
        let connection_string = config.connection_url()?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .test_before_acquire(true)
            .connect_lazy(&connection_string)
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            acquire_timeout_secs = config.connection_timeout,
            "Created database pool"
        );
        Ok(pool)
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(pool: &PgPool) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(pool).await?;
        Ok(())
    }

    /// Close the pool (e.g., on shutdown)
    pub async fn close(pool: &PgPool) {
        pool.close().await;
        info!("Closed database pool");
    }

    /// Quote SQL identifier to prevent injection
    pub fn quote_identifier(name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_identifiers() {
        assert_eq!(DatabaseManager::quote_identifier("event_time"), "\"event_time\"");
        assert_eq!(DatabaseManager::quote_identifier("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn pool_timeouts_count_as_unavailable() {
        assert!(DatabaseError::Sqlx(sqlx::Error::PoolTimedOut).is_unavailable());
        assert!(DatabaseError::ConnectionError("refused".into()).is_unavailable());
        assert!(!DatabaseError::Sqlx(sqlx::Error::Protocol("syntax".into())).is_unavailable());
        assert!(!DatabaseError::Sqlx(sqlx::Error::RowNotFound).is_unavailable());
    }

    #[tokio::test]
    async fn lazy_pool_requires_connection_parts() {
        let config = DatabaseConfig::default();
        assert!(matches!(
            DatabaseManager::connect_lazy(&config),
            Err(DatabaseError::ConfigMissing("DB_HOST"))
        ));
    }
}
