use once_cell::sync::OnceCell;
use sqlx::{
    pool::PoolConnection,
    postgres::{PgConnectOptions, PgPoolOptions},
    ConnectOptions, PgPool, Postgres, Transaction,
};
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::config;

/// Errors from DatabaseManager
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    #[error("Timed out waiting for a pooled connection")]
    PoolTimedOut,

    #[error("Migration error: {0}")]
    Migration(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl DatabaseError {
    pub(crate) fn classify(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => DatabaseError::PoolTimedOut,
            ref e if is_connection_refused(e) => DatabaseError::ConnectionRefused(e.to_string()),
            other => DatabaseError::Sqlx(other),
        }
    }
}

/// Owner of the process-wide connection pool
pub struct DatabaseManager;

static POOL: OnceCell<PgPool> = OnceCell::new();

impl DatabaseManager {
    /// Get the shared pool, building it lazily on first use.
    ///
    /// The pool is created with `connect_lazy_with`, so no connection is opened until
    /// a query needs one; routes that never touch the database work without it.
    pub fn pool() -> Result<PgPool, DatabaseError> {
        POOL.get_or_try_init(Self::build_pool).cloned()
    }

    fn build_pool() -> Result<PgPool, DatabaseError> {
        let db = &config::config().database;

        let mut options = PgConnectOptions::from_str(&db.url)?;
        if !db.enable_query_logging {
            options = options.disable_statement_logging();
        }

        let pool = PgPoolOptions::new()
            .max_connections(db.max_connections)
            .min_connections(db.min_connections)
            .acquire_timeout(Duration::from_secs(db.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(db.idle_timeout_secs))
            .connect_lazy_with(options);

        info!(
            "Created database pool (max {} connections, connect timeout {}s, idle timeout {}s)",
            db.max_connections, db.connect_timeout_secs, db.idle_timeout_secs
        );
        Ok(pool)
    }

    /// Acquire a pooled connection, retrying once when the server refuses it
    pub async fn acquire(pool: &PgPool) -> Result<PoolConnection<Postgres>, DatabaseError> {
        Self::with_retry(|| pool.acquire()).await
    }

    /// Open a transaction, retrying once when the server refuses the connection
    pub async fn begin(pool: &PgPool) -> Result<Transaction<'static, Postgres>, DatabaseError> {
        Self::with_retry(|| pool.begin()).await
    }

    /// Runs `op`, and on a refused connection waits the configured delay and runs it exactly once more.
    pub async fn with_retry<T, F, Fut>(op: F) -> Result<T, DatabaseError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, sqlx::Error>>,
    {
        let delay = Duration::from_millis(config::config().database.retry_delay_ms);
        retry_once(delay, op).await
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check() -> Result<(), DatabaseError> {
        let pool = Self::pool()?;
        let mut conn = Self::acquire(&pool).await?;
        sqlx::query("SELECT 1").execute(&mut *conn).await?;
        Ok(())
    }

    /// Apply the embedded schema migrations
    pub async fn migrate() -> Result<(), DatabaseError> {
        let pool = Self::pool()?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;
        info!("Database migrations applied");
        Ok(())
    }

    /// Close the pool (e.g., on shutdown)
    pub async fn close() {
        if let Some(pool) = POOL.get() {
            pool.close().await;
            info!("Closed database pool");
        }
    }
}

async fn retry_once<T, F, Fut>(delay: Duration, op: F) -> Result<T, DatabaseError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    match op().await {
        Ok(value) => Ok(value),
        Err(err) if is_connection_refused(&err) => {
            warn!("Database connection refused, retrying in {:?}", delay);
            tokio::time::sleep(delay).await;
            op().await.map_err(DatabaseError::classify)
        }
        Err(err) => Err(DatabaseError::classify(err)),
    }
}

fn is_connection_refused(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Io(io) if io.kind() == std::io::ErrorKind::ConnectionRefused)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn refused() -> sqlx::Error {
        sqlx::Error::Io(std::io::Error::from(std::io::ErrorKind::ConnectionRefused))
    }

    #[tokio::test]
    async fn retries_refused_connection_exactly_once() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), DatabaseError> = retry_once(Duration::from_millis(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(refused()) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(matches!(result, Err(DatabaseError::ConnectionRefused(_))));
    }

    #[tokio::test]
    async fn second_attempt_can_succeed() {
        let calls = AtomicUsize::new(0);
        let result = retry_once(Duration::from_millis(1), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(refused())
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), DatabaseError> = retry_once(Duration::from_millis(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(sqlx::Error::RowNotFound) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(DatabaseError::Sqlx(sqlx::Error::RowNotFound))));
    }

    #[test]
    fn pool_timeouts_are_classified() {
        assert!(matches!(
            DatabaseError::classify(sqlx::Error::PoolTimedOut),
            DatabaseError::PoolTimedOut
        ));
    }
}
