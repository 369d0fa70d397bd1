//! Postgres connection pool.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::DbError;

/// Shared Postgres pool used by the API, the orchestrator and the
/// `database` action sink.
pub type DbPool = PgPool;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Connect to `database_url` with at most `max_connections` connections.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<DbPool, DbError> {
    info!(max_connections, "connecting to form store");
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Apply the migrations embedded from the workspace `migrations/` directory.
pub async fn run_migrations(pool: &DbPool) -> Result<(), DbError> {
    info!("applying form store migrations");
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}
