//! Database operations for the audit log table.

use super::{quoted, StoreError, MAX_IDENT_LEN};
use catalog_engine::{AuditEntry, ChangeType};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

/// A stored audit row.
#[derive(Debug)]
pub struct StoredAuditEntry {
    pub id: i64,
    pub change_type: String,
    pub item_id: String,
    pub changed_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredAuditEntry {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredAuditEntry {
            id: row.try_get("id")?,
            change_type: row.try_get("change_type")?,
            item_id: row.try_get("item_id")?,
            changed_at: row.try_get("changed_at")?,
        })
    }
}

impl StoredAuditEntry {
    /// Convert database row to an engine audit entry.
    pub fn to_entry(&self) -> Result<AuditEntry, StoreError> {
        let change_type: ChangeType = self
            .change_type
            .parse()
            .map_err(|e| StoreError::InvalidRow(format!("audit row {}: {}", self.id, e)))?;
        Ok(AuditEntry::new(
            change_type,
            self.item_id.clone(),
            self.changed_at,
        ))
    }
}

const INDEX_SUFFIX: &str = "_changed_at_idx";

/// Name of the newest-first index on audit table `table`.
///
/// Long table names are cut so the index name stays within the identifier
/// limit. `table` must already be a valid identifier.
fn audit_index_name(table: &str) -> String {
    let keep = table.len().min(MAX_IDENT_LEN - INDEX_SUFFIX.len());
    format!("\"{}{INDEX_SUFFIX}\"", &table[..keep])
}

/// Create an audit table named `table` and its newest-first index if they do
/// not exist.
pub async fn create_audit_table(pool: &PgPool, table: &str) -> Result<(), StoreError> {
    let quoted_table = quoted(table)?;
    let index = audit_index_name(table);
    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {quoted_table} (
            id BIGSERIAL PRIMARY KEY,
            change_type TEXT NOT NULL CHECK (change_type IN ('INSERT', 'UPDATE', 'DELETE')),
            item_id TEXT NOT NULL,
            changed_at TIMESTAMPTZ NOT NULL
        )
        "#
    ))
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS {index} ON {quoted_table} (changed_at DESC, id DESC)"
    ))
    .execute(pool)
    .await?;

    Ok(())
}

/// Append `entries` in a single statement, preserving their order.
pub async fn insert_audit_entries(
    pool: &PgPool,
    table: &str,
    entries: &[AuditEntry],
) -> Result<(), StoreError> {
    let table = quoted(table)?;
    let change_types: Vec<&str> = entries.iter().map(|e| e.change_type.as_str()).collect();
    let item_ids: Vec<&str> = entries.iter().map(|e| e.item_id.as_str()).collect();
    let changed_at: Vec<DateTime<Utc>> = entries.iter().map(|e| e.changed_at).collect();

    sqlx::query(&format!(
        r#"
        INSERT INTO {table} (change_type, item_id, changed_at)
        SELECT change_type, item_id, changed_at
        FROM UNNEST($1::TEXT[], $2::TEXT[], $3::TIMESTAMPTZ[])
            WITH ORDINALITY AS batch (change_type, item_id, changed_at, position)
        ORDER BY position
        "#
    ))
    .bind(change_types)
    .bind(item_ids)
    .bind(changed_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Get the most recent audit rows, newest first.
pub async fn recent_audit_entries(
    pool: &PgPool,
    table: &str,
    limit: i64,
) -> Result<Vec<StoredAuditEntry>, StoreError> {
    let table = quoted(table)?;
    let rows = sqlx::query_as::<_, StoredAuditEntry>(&format!(
        r#"
        SELECT id, change_type, item_id, changed_at
        FROM {table}
        ORDER BY changed_at DESC, id DESC
        LIMIT $1
        "#
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
