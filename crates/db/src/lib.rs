//! Postgres persistence for TraceAM.
//!
//! Repositories are zero-sized structs with `async fn`s taking a pool.
//! [`PgIncidentStore`] and [`PgUserStore`] adapt them to the store traits
//! in `traceam_core::store`.

use sqlx::postgres::PgPoolOptions;

pub mod models;
pub mod repositories;

pub use repositories::{PgIncidentStore, PgUserStore};

pub type DbPool = sqlx::PgPool;

/// Default pool size when none is configured.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 20;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// Verify the database answers a trivial query.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply the embedded migrations under `crates/db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Map a sqlx failure onto the store-level error.
pub(crate) fn store_err(err: sqlx::Error) -> traceam_core::store::StoreError {
    tracing::error!(error = %err, "Database error");
    traceam_core::store::StoreError::Unavailable(err.to_string())
}
