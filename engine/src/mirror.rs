//! Mirror store abstraction.
//!
//! The mirror is a key-value-like table of items plus two auxiliary tables: an
//! append-only audit log and a sync metadata table upserted by table name.
//! Every call is expected to be atomic on its own; nothing is transactional
//! across calls.

use crate::{AuditEntry, Item, ItemId, SyncMetadata, TableName};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use thiserror::Error;

/// Operations a mirror store supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MirrorOp {
    ReadAll,
    UpsertMany,
    DeleteByKey,
    AppendAudit,
    UpsertMetadata,
}

impl MirrorOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            MirrorOp::ReadAll => "read_all",
            MirrorOp::UpsertMany => "upsert_many",
            MirrorOp::DeleteByKey => "delete_by_key",
            MirrorOp::AppendAudit => "append_audit",
            MirrorOp::UpsertMetadata => "upsert_metadata",
        }
    }
}

impl fmt::Display for MirrorOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A mutable local table mirroring the remote catalog.
///
/// Implementations must give `upsert_many` true upsert semantics keyed by
/// `item_id`: re-applying the same items leaves the table unchanged apart from
/// the sync stamp. Items returned by `read_all` carry that stamp in
/// [`Item::synced_at`], never in their field map.
pub trait MirrorStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Read every row of `table` as an item.
    fn read_all(&mut self, table: &str)
        -> impl Future<Output = Result<Vec<Item>, Self::Error>> + Send;

    /// Insert or replace `items` by key, stamping each row with `synced_at`.
    fn upsert_many(
        &mut self,
        table: &str,
        items: &[Item],
        synced_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Delete the row keyed by `item_id`. Deleting a missing key is not an error.
    fn delete_by_key(
        &mut self,
        table: &str,
        item_id: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Append entries to the audit log.
    fn append(
        &mut self,
        audit_table: &str,
        entries: &[AuditEntry],
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Insert or replace the metadata row keyed by `row.table_name`.
    fn upsert_metadata(
        &mut self,
        metadata_table: &str,
        row: &SyncMetadata,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Failure raised by [`MemoryMirror`] when a failure was scheduled.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("simulated {op} failure on table {table}")]
pub struct MemoryStoreError {
    pub op: MirrorOp,
    pub table: TableName,
}

#[derive(Debug, Clone)]
struct ScheduledFailure {
    op: MirrorOp,
    /// Successful calls of `op` still allowed before failing
    remaining: usize,
}

/// In-memory mirror store.
///
/// Rows are kept ordered by key. Upserted rows are stamped with their sync
/// time like the SQL mirror does.
#[derive(Debug, Clone, Default)]
pub struct MemoryMirror {
    tables: HashMap<TableName, BTreeMap<ItemId, Item>>,
    audit: HashMap<TableName, Vec<AuditEntry>>,
    metadata: HashMap<TableName, BTreeMap<TableName, SyncMetadata>>,
    failure: Option<ScheduledFailure>,
}

impl MemoryMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put rows into `table` as-is, without a sync stamp.
    pub fn seed(&mut self, table: &str, items: impl IntoIterator<Item = Item>) {
        let rows = self.tables.entry(table.to_string()).or_default();
        for item in items {
            rows.insert(item.id().to_string(), item);
        }
    }

    /// Rows of `table` in key order.
    pub fn rows(&self, table: &str) -> Vec<&Item> {
        self.tables
            .get(table)
            .map(|rows| rows.values().collect())
            .unwrap_or_default()
    }

    /// A single row of `table`.
    pub fn row(&self, table: &str, item_id: &str) -> Option<&Item> {
        self.tables.get(table)?.get(item_id)
    }

    /// Entries appended to `audit_table`, oldest first.
    pub fn audit_log(&self, audit_table: &str) -> &[AuditEntry] {
        self.audit
            .get(audit_table)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The metadata row for `table_name` in `metadata_table`.
    pub fn metadata(&self, metadata_table: &str, table_name: &str) -> Option<&SyncMetadata> {
        self.metadata.get(metadata_table)?.get(table_name)
    }

    /// Make the next call of `op` fail.
    pub fn fail_on(&mut self, op: MirrorOp) {
        self.fail_after(op, 0);
    }

    /// Let `successes` calls of `op` through, then fail the next one.
    pub fn fail_after(&mut self, op: MirrorOp, successes: usize) {
        self.failure = Some(ScheduledFailure {
            op,
            remaining: successes,
        });
    }

    fn check(&mut self, op: MirrorOp, table: &str) -> Result<(), MemoryStoreError> {
        match self.failure.as_mut() {
            Some(scheduled) if scheduled.op == op => {
                if scheduled.remaining == 0 {
                    self.failure = None;
                    return Err(MemoryStoreError {
                        op,
                        table: table.to_string(),
                    });
                }
                scheduled.remaining -= 1;
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

impl MirrorStore for MemoryMirror {
    type Error = MemoryStoreError;

    async fn read_all(&mut self, table: &str) -> Result<Vec<Item>, Self::Error> {
        self.check(MirrorOp::ReadAll, table)?;
        Ok(self.rows(table).into_iter().cloned().collect())
    }

    async fn upsert_many(
        &mut self,
        table: &str,
        items: &[Item],
        synced_at: DateTime<Utc>,
    ) -> Result<(), Self::Error> {
        self.check(MirrorOp::UpsertMany, table)?;
        let rows = self.tables.entry(table.to_string()).or_default();
        for item in items {
            rows.insert(item.id().to_string(), item.clone().with_synced_at(synced_at));
        }
        Ok(())
    }

    async fn delete_by_key(&mut self, table: &str, item_id: &str) -> Result<(), Self::Error> {
        self.check(MirrorOp::DeleteByKey, table)?;
        if let Some(rows) = self.tables.get_mut(table) {
            rows.remove(item_id);
        }
        Ok(())
    }

    async fn append(
        &mut self,
        audit_table: &str,
        entries: &[AuditEntry],
    ) -> Result<(), Self::Error> {
        self.check(MirrorOp::AppendAudit, audit_table)?;
        self.audit
            .entry(audit_table.to_string())
            .or_default()
            .extend_from_slice(entries);
        Ok(())
    }

    async fn upsert_metadata(
        &mut self,
        metadata_table: &str,
        row: &SyncMetadata,
    ) -> Result<(), Self::Error> {
        self.check(MirrorOp::UpsertMetadata, metadata_table)?;
        self.metadata
            .entry(metadata_table.to_string())
            .or_default()
            .insert(row.table_name.clone(), row.clone());
        Ok(())
    }
}
