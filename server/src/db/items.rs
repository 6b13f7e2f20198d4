//! Database operations for the mirror item table.

use super::{quoted, StoreError};
use catalog_engine::Item;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Row};

/// A stored mirror row.
///
/// Only the columns needed to rebuild the item are read; the typed columns
/// exist for ad hoc queries against the mirror.
#[derive(Debug)]
pub struct StoredItem {
    pub item_id: String,
    pub raw_json: Value,
    pub last_synced_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredItem {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredItem {
            item_id: row.try_get("item_id")?,
            raw_json: row.try_get("raw_json")?,
            last_synced_at: row.try_get("last_synced_at")?,
        })
    }
}

impl StoredItem {
    /// Rebuild the item as it was fetched, stamped with `last_synced_at`.
    pub fn into_item(self) -> Result<Item, StoreError> {
        let item = Item::from_value(self.raw_json)
            .map_err(|e| StoreError::InvalidRow(format!("item {}: {}", self.item_id, e)))?;
        if item.id() != self.item_id {
            return Err(StoreError::InvalidRow(format!(
                "item {} stores a record keyed {}",
                self.item_id,
                item.id()
            )));
        }

        Ok(item.with_synced_at(self.last_synced_at))
    }
}

/// Create a mirror item table named `table` if it does not exist.
pub async fn create_items_table(pool: &PgPool, table: &str) -> Result<(), StoreError> {
    let table = quoted(table)?;
    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            item_id TEXT PRIMARY KEY,
            name TEXT,
            sku TEXT,
            rate DOUBLE PRECISION,
            purchase_rate DOUBLE PRECISION,
            status TEXT,
            is_taxable BOOLEAN,
            tax_id TEXT,
            tax_percentage DOUBLE PRECISION,
            created_time TEXT,
            last_modified_time TEXT,
            raw_json JSONB NOT NULL,
            last_synced_at TIMESTAMPTZ NOT NULL
        )
        "#
    ))
    .execute(pool)
    .await?;

    Ok(())
}

/// Get mirror rows ordered by key, at most `limit` of them when given.
pub async fn select_items(
    pool: &PgPool,
    table: &str,
    limit: Option<i64>,
) -> Result<Vec<StoredItem>, StoreError> {
    let table = quoted(table)?;
    let rows = sqlx::query_as::<_, StoredItem>(&format!(
        r#"
        SELECT item_id, raw_json, last_synced_at
        FROM {table}
        ORDER BY item_id
        LIMIT $1
        "#
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Insert or replace `items` in one transaction, stamping each row with
/// `synced_at`.
pub async fn upsert_items(
    pool: &PgPool,
    table: &str,
    items: &[Item],
    synced_at: DateTime<Utc>,
) -> Result<(), StoreError> {
    let table = quoted(table)?;
    let sql = format!(
        r#"
        INSERT INTO {table} (
            item_id, name, sku, rate, purchase_rate, status, is_taxable,
            tax_id, tax_percentage, created_time, last_modified_time,
            raw_json, last_synced_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        ON CONFLICT (item_id) DO UPDATE SET
            name = EXCLUDED.name,
            sku = EXCLUDED.sku,
            rate = EXCLUDED.rate,
            purchase_rate = EXCLUDED.purchase_rate,
            status = EXCLUDED.status,
            is_taxable = EXCLUDED.is_taxable,
            tax_id = EXCLUDED.tax_id,
            tax_percentage = EXCLUDED.tax_percentage,
            created_time = EXCLUDED.created_time,
            last_modified_time = EXCLUDED.last_modified_time,
            raw_json = EXCLUDED.raw_json,
            last_synced_at = EXCLUDED.last_synced_at
        "#
    );

    let mut tx = pool.begin().await?;
    for item in items {
        sqlx::query(&sql)
            .bind(item.id())
            .bind(item.name())
            .bind(item.sku())
            .bind(item.rate())
            .bind(item.purchase_rate())
            .bind(item.status())
            .bind(item.is_taxable())
            .bind(item.tax_id())
            .bind(item.tax_percentage())
            .bind(item.created_time())
            .bind(item.last_modified_time())
            .bind(Value::Object(item.fields().clone()))
            .bind(synced_at)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    Ok(())
}

/// Delete the row keyed by `item_id`. Returns whether a row was removed.
pub async fn delete_item(pool: &PgPool, table: &str, item_id: &str) -> Result<bool, StoreError> {
    let table = quoted(table)?;
    let result = sqlx::query(&format!("DELETE FROM {table} WHERE item_id = $1"))
        .bind(item_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
