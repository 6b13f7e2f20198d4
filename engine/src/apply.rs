//! Apply phase: realize an [`ActionBatch`] against a [`MirrorStore`].
//!
//! Order is fixed: upserts, then deletes, then the audit append, then the
//! metadata upsert. A failure stops the phase at once; earlier calls are not
//! rolled back, and the failure carries the counts applied so far.

use crate::{ActionBatch, MirrorOp, MirrorStore, SyncMetadata, SyncPhase, TableName};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Names of the three tables a cycle writes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorTables {
    /// The mirrored item table
    pub items: TableName,
    /// Append-only audit log
    pub audit: TableName,
    /// Per-table sync metadata
    pub metadata: TableName,
}

impl Default for MirrorTables {
    fn default() -> Self {
        Self {
            items: "items_core".to_string(),
            audit: "audit_change_log".to_string(),
            metadata: "sync_metadata".to_string(),
        }
    }
}

/// Counts of changes applied to the mirror.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedResult {
    pub inserted_count: u64,
    pub updated_count: u64,
    pub deleted_count: u64,
}

impl fmt::Display for AppliedResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} inserted, {} updated, {} deleted",
            self.inserted_count, self.updated_count, self.deleted_count
        )
    }
}

/// A store call that failed during the apply phase.
#[derive(Debug, Error)]
#[error("{op} failed during {phase} phase ({applied}): {source}")]
pub struct ApplyFailure<E: std::error::Error + 'static> {
    pub phase: SyncPhase,
    pub op: MirrorOp,
    /// Changes that reached the store before the failure
    pub applied: AppliedResult,
    #[source]
    pub source: E,
}

fn fail<E: std::error::Error + 'static>(
    phase: SyncPhase,
    op: MirrorOp,
    applied: AppliedResult,
) -> impl FnOnce(E) -> ApplyFailure<E> {
    move |source| ApplyFailure {
        phase,
        op,
        applied,
        source,
    }
}

/// Apply `batch` to `store`, append its audit entries and upsert the metadata
/// row for `tables.items`.
///
/// Every row and audit entry written is stamped with `changed_at`.
pub async fn apply<M: MirrorStore>(
    store: &mut M,
    tables: &MirrorTables,
    batch: &ActionBatch,
    changed_at: DateTime<Utc>,
) -> Result<AppliedResult, ApplyFailure<M::Error>> {
    let mut applied = AppliedResult::default();

    if !batch.inserts.is_empty() {
        store
            .upsert_many(&tables.items, &batch.inserts, changed_at)
            .await
            .map_err(fail(SyncPhase::Apply, MirrorOp::UpsertMany, applied))?;
        applied.inserted_count = batch.inserts.len() as u64;
    }

    if !batch.updates.is_empty() {
        store
            .upsert_many(&tables.items, &batch.updates, changed_at)
            .await
            .map_err(fail(SyncPhase::Apply, MirrorOp::UpsertMany, applied))?;
        applied.updated_count = batch.updates.len() as u64;
    }

    for item in &batch.deletes {
        store
            .delete_by_key(&tables.items, item.id())
            .await
            .map_err(fail(SyncPhase::Apply, MirrorOp::DeleteByKey, applied))?;
        applied.deleted_count += 1;
    }

    let entries = batch.audit_entries(changed_at);
    if !entries.is_empty() {
        store
            .append(&tables.audit, &entries)
            .await
            .map_err(fail(SyncPhase::Audit, MirrorOp::AppendAudit, applied))?;
        debug!(entries = entries.len(), table = %tables.audit, "appended audit entries");
    }

    let row = SyncMetadata::for_cycle(tables.items.clone(), changed_at, &applied);
    store
        .upsert_metadata(&tables.metadata, &row)
        .await
        .map_err(fail(SyncPhase::Metadata, MirrorOp::UpsertMetadata, applied))?;

    Ok(applied)
}
