//! The PostgreSQL mirror store.

use super::{
    delete_item, insert_audit_entries, select_items, upsert_items, upsert_metadata_row, Pool,
    StoreError,
};
use catalog_engine::{AuditEntry, Item, MirrorStore, SyncMetadata};
use chrono::{DateTime, Utc};

/// Mirror store backed by a PostgreSQL pool.
///
/// Each call runs in its own statement or transaction; nothing spans calls.
#[derive(Debug, Clone)]
pub struct PgMirror {
    pool: Pool,
}

impl PgMirror {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

impl MirrorStore for PgMirror {
    type Error = StoreError;

    async fn read_all(&mut self, table: &str) -> Result<Vec<Item>, Self::Error> {
        select_items(&self.pool, table, None)
            .await?
            .into_iter()
            .map(|row| row.into_item())
            .collect()
    }

    async fn upsert_many(
        &mut self,
        table: &str,
        items: &[Item],
        synced_at: DateTime<Utc>,
    ) -> Result<(), Self::Error> {
        upsert_items(&self.pool, table, items, synced_at).await
    }

    async fn delete_by_key(&mut self, table: &str, item_id: &str) -> Result<(), Self::Error> {
        delete_item(&self.pool, table, item_id).await?;
        Ok(())
    }

    async fn append(
        &mut self,
        audit_table: &str,
        entries: &[AuditEntry],
    ) -> Result<(), Self::Error> {
        insert_audit_entries(&self.pool, audit_table, entries).await
    }

    async fn upsert_metadata(
        &mut self,
        metadata_table: &str,
        row: &SyncMetadata,
    ) -> Result<(), Self::Error> {
        upsert_metadata_row(&self.pool, metadata_table, row).await
    }
}
