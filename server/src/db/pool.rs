//! Database connection pool management.

use super::{create_audit_table, create_items_table, create_metadata_table, StoreError};
use catalog_engine::MirrorTables;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Type alias for the database pool.
pub type Pool = PgPool;

/// Create a new database connection pool.
pub async fn create_pool(database_url: &str) -> Result<Pool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
}

/// Run database migrations.
pub async fn run_migrations(pool: &Pool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Create the configured tables if they do not exist yet.
///
/// The migrations create the default-named tables; this covers names
/// overridden through configuration.
pub async fn ensure_tables(pool: &Pool, tables: &MirrorTables) -> Result<(), StoreError> {
    create_items_table(pool, &tables.items).await?;
    create_audit_table(pool, &tables.audit).await?;
    create_metadata_table(pool, &tables.metadata).await?;
    Ok(())
}
