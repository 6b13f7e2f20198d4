//! Database operations for the sync metadata table.

use super::{quoted, StoreError};
use catalog_engine::SyncMetadata;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

/// A stored metadata row.
#[derive(Debug)]
pub struct StoredMetadata {
    pub table_name: String,
    pub last_synced_at: DateTime<Utc>,
    pub inserted_count: i64,
    pub updated_count: i64,
    pub deleted_count: i64,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredMetadata {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredMetadata {
            table_name: row.try_get("table_name")?,
            last_synced_at: row.try_get("last_synced_at")?,
            inserted_count: row.try_get("inserted_count")?,
            updated_count: row.try_get("updated_count")?,
            deleted_count: row.try_get("deleted_count")?,
        })
    }
}

impl StoredMetadata {
    /// Convert database row to engine metadata.
    pub fn into_metadata(self) -> SyncMetadata {
        SyncMetadata {
            table_name: self.table_name,
            last_synced_at: self.last_synced_at,
            inserted_count: self.inserted_count.max(0) as u64,
            updated_count: self.updated_count.max(0) as u64,
            deleted_count: self.deleted_count.max(0) as u64,
        }
    }
}

/// Create a metadata table named `table` if it does not exist.
pub async fn create_metadata_table(pool: &PgPool, table: &str) -> Result<(), StoreError> {
    let table = quoted(table)?;
    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            table_name TEXT PRIMARY KEY,
            last_synced_at TIMESTAMPTZ NOT NULL,
            inserted_count BIGINT NOT NULL DEFAULT 0,
            updated_count BIGINT NOT NULL DEFAULT 0,
            deleted_count BIGINT NOT NULL DEFAULT 0
        )
        "#
    ))
    .execute(pool)
    .await?;

    Ok(())
}

/// Upsert the metadata row keyed by `row.table_name`.
pub async fn upsert_metadata_row(
    pool: &PgPool,
    table: &str,
    row: &SyncMetadata,
) -> Result<(), StoreError> {
    let table = quoted(table)?;
    sqlx::query(&format!(
        r#"
        INSERT INTO {table} (
            table_name, last_synced_at, inserted_count, updated_count, deleted_count
        )
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (table_name) DO UPDATE SET
            last_synced_at = EXCLUDED.last_synced_at,
            inserted_count = EXCLUDED.inserted_count,
            updated_count = EXCLUDED.updated_count,
            deleted_count = EXCLUDED.deleted_count
        "#
    ))
    .bind(&row.table_name)
    .bind(row.last_synced_at)
    .bind(row.inserted_count as i64)
    .bind(row.updated_count as i64)
    .bind(row.deleted_count as i64)
    .execute(pool)
    .await?;

    Ok(())
}

/// Get the metadata row for `table_name`.
pub async fn get_metadata(
    pool: &PgPool,
    table: &str,
    table_name: &str,
) -> Result<Option<StoredMetadata>, StoreError> {
    let table = quoted(table)?;
    let row = sqlx::query_as::<_, StoredMetadata>(&format!(
        r#"
        SELECT table_name, last_synced_at, inserted_count, updated_count, deleted_count
        FROM {table}
        WHERE table_name = $1
        "#
    ))
    .bind(table_name)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
