//! Sync orchestration: one full reconciliation cycle.
//!
//! A cycle runs fetch → read → reconcile → apply → audit → metadata, strictly
//! in that order and without concurrency. It either completes or fails; the
//! unit of retry is the whole cycle, and re-running a cycle against an
//! unchanged remote catalog is a no-op pass.
//!
//! When the page bound truncates the remote catalog, the cycle still applies
//! inserts and updates but withholds every deletion, since items missing from
//! a partial catalog are not known to be gone.

use crate::{
    apply, error::Result, fetch_all, ActionBatch, AppliedResult, DeletePolicy, Error,
    FetchedCatalog, Item, ItemId, MirrorOp, MirrorStore, MirrorTables, PageNumber, Reconciler,
    RemoteSource, SkippedRecord, Snapshot, TableName,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, info_span, warn, Instrument};

/// Default bound on remote pages per cycle.
pub const DEFAULT_MAX_PAGES: PageNumber = 50;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Stages of a cycle, as reported by failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPhase {
    /// Paging through the remote catalog
    Fetch,
    /// Reading the mirror table
    Read,
    /// Upserting and deleting mirror rows
    Apply,
    /// Appending the audit trail
    Audit,
    /// Upserting the sync metadata row
    Metadata,
}

impl SyncPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Fetch => "fetch",
            SyncPhase::Read => "read",
            SyncPhase::Apply => "apply",
            SyncPhase::Audit => "audit",
            SyncPhase::Metadata => "metadata",
        }
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fatal cycle failure.
///
/// States the phase that failed and how far the cycle got before it.
#[derive(Debug, Error)]
#[error(
    "sync failed during {phase} phase after fetching {fetched} remote records ({applied}): {source}"
)]
pub struct SyncError {
    pub phase: SyncPhase,
    /// Raw remote records received before the failure
    pub fetched: usize,
    /// Changes that reached the mirror before the failure
    pub applied: AppliedResult,
    #[source]
    pub source: BoxError,
}

/// A mirror store call that failed, tagged with the operation.
#[derive(Debug, Error)]
#[error("{op} failed: {source}")]
struct StoreFailure {
    op: MirrorOp,
    #[source]
    source: BoxError,
}

impl StoreFailure {
    fn new(op: MirrorOp, source: impl Into<BoxError>) -> Self {
        Self {
            op,
            source: source.into(),
        }
    }
}

impl SyncError {
    fn new(
        phase: SyncPhase,
        fetched: usize,
        applied: AppliedResult,
        source: impl Into<BoxError>,
    ) -> Self {
        Self {
            phase,
            fetched,
            applied,
            source: source.into(),
        }
    }
}

/// Settings for a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOptions {
    pub tables: MirrorTables,
    /// Upper bound on remote pages fetched per cycle
    pub max_pages: PageNumber,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            tables: MirrorTables::default(),
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

impl SyncOptions {
    /// Create options. `max_pages` must be at least 1.
    pub fn new(tables: MirrorTables, max_pages: PageNumber) -> Result<Self> {
        if max_pages == 0 {
            return Err(Error::InvalidOption("max_pages must be at least 1".into()));
        }
        Ok(Self { tables, max_pages })
    }
}

/// Raised when the page bound cut the remote catalog short.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialFetchWarning {
    pub pages_fetched: PageNumber,
    pub max_pages: PageNumber,
    /// Mirror items kept although absent from the partial catalog
    pub deletes_suppressed: usize,
}

impl fmt::Display for PartialFetchWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "remote catalog truncated at {} of max {} pages; {} deletions suppressed",
            self.pages_fetched, self.max_pages, self.deletes_suppressed
        )
    }
}

/// Outcome of a completed cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub table_name: TableName,
    pub synced_at: DateTime<Utc>,
    pub pages_fetched: PageNumber,
    /// Raw remote records received
    pub fetched_count: usize,
    #[serde(flatten)]
    pub applied: AppliedResult,
    /// Remote records excluded from the diff
    pub skipped: Vec<SkippedRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<PartialFetchWarning>,
}

/// What a cycle would change, without applying it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPreview {
    pub table_name: TableName,
    pub pages_fetched: PageNumber,
    pub fetched_count: usize,
    pub inserts: Vec<ItemId>,
    pub updates: Vec<ItemId>,
    pub deletes: Vec<ItemId>,
    pub skipped: Vec<SkippedRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<PartialFetchWarning>,
}

/// Drives one reconciliation cycle between a remote source and a mirror store.
pub struct SyncCycle<'a, R, M> {
    source: &'a mut R,
    mirror: &'a mut M,
    options: &'a SyncOptions,
}

/// Everything computed before the apply phase.
struct Plan {
    catalog: FetchedCatalog,
    batch: ActionBatch,
    warning: Option<PartialFetchWarning>,
}

impl<'a, R: RemoteSource, M: MirrorStore> SyncCycle<'a, R, M> {
    pub fn new(source: &'a mut R, mirror: &'a mut M, options: &'a SyncOptions) -> Self {
        Self {
            source,
            mirror,
            options,
        }
    }

    /// Run the full cycle. `now` stamps every row, audit entry and the
    /// metadata row written by this cycle.
    pub async fn run(self, now: DateTime<Utc>) -> std::result::Result<SyncReport, SyncError> {
        let span = info_span!("sync_cycle", table = %self.options.tables.items);
        self.run_inner(now).instrument(span).await
    }

    /// Fetch and reconcile without touching the mirror.
    pub async fn preview(mut self) -> std::result::Result<SyncPreview, SyncError> {
        let span = info_span!("sync_preview", table = %self.options.tables.items);
        async move {
            let plan = self.plan().await?;
            Ok(SyncPreview {
                table_name: self.options.tables.items.clone(),
                pages_fetched: plan.catalog.pages_fetched,
                fetched_count: plan.catalog.records_seen,
                inserts: item_ids(&plan.batch.inserts),
                updates: item_ids(&plan.batch.updates),
                deletes: item_ids(&plan.batch.deletes),
                skipped: plan.catalog.skipped,
                warning: plan.warning,
            })
        }
        .instrument(span)
        .await
    }

    async fn run_inner(mut self, now: DateTime<Utc>) -> std::result::Result<SyncReport, SyncError> {
        info!(max_pages = self.options.max_pages, "starting sync cycle");

        let plan = self.plan().await?;
        let fetched = plan.catalog.records_seen;

        let applied = apply(&mut *self.mirror, &self.options.tables, &plan.batch, now)
            .await
            .map_err(|failure| {
                SyncError::new(
                    failure.phase,
                    fetched,
                    failure.applied,
                    StoreFailure::new(failure.op, failure.source),
                )
            })?;

        info!(
            fetched,
            inserted = applied.inserted_count,
            updated = applied.updated_count,
            deleted = applied.deleted_count,
            skipped = plan.catalog.skipped.len(),
            "sync cycle complete"
        );

        Ok(SyncReport {
            table_name: self.options.tables.items.clone(),
            synced_at: now,
            pages_fetched: plan.catalog.pages_fetched,
            fetched_count: fetched,
            applied,
            skipped: plan.catalog.skipped,
            warning: plan.warning,
        })
    }

    async fn plan(&mut self) -> std::result::Result<Plan, SyncError> {
        let tables = &self.options.tables;

        let catalog = fetch_all(&mut *self.source, self.options.max_pages)
            .await
            .map_err(|failure| {
                SyncError::new(
                    SyncPhase::Fetch,
                    failure.records_seen,
                    AppliedResult::default(),
                    failure,
                )
            })?;
        let fetched = catalog.records_seen;

        for skipped in &catalog.skipped {
            warn!(
                page = skipped.page,
                item_id = skipped.item_id.as_deref().unwrap_or("-"),
                reason = %skipped.reason,
                "skipping remote record"
            );
        }

        let read_failed = |source: BoxError| {
            SyncError::new(SyncPhase::Read, fetched, AppliedResult::default(), source)
        };
        let rows = self
            .mirror
            .read_all(&tables.items)
            .await
            .map_err(|e| read_failed(StoreFailure::new(MirrorOp::ReadAll, e).into()))?;
        let mirror = Snapshot::from_items(rows).map_err(|e| read_failed(e.into()))?;

        let policy = if catalog.truncated {
            DeletePolicy::Suppress
        } else {
            DeletePolicy::Propagate
        };
        let batch = Reconciler::new(policy).reconcile(&catalog.snapshot, &mirror);

        for item in &batch.updates {
            if let Some(existing) = mirror.get(item.id()) {
                debug!(
                    item_id = item.id(),
                    fields = ?item.changed_fields(existing),
                    "item changed"
                );
            }
        }

        let warning = catalog.truncated.then(|| PartialFetchWarning {
            pages_fetched: catalog.pages_fetched,
            max_pages: self.options.max_pages,
            deletes_suppressed: batch.deletes_suppressed,
        });
        if let Some(warning) = &warning {
            warn!(%warning, "partial fetch");
        }

        debug!(
            remote = catalog.snapshot.len(),
            mirror = mirror.len(),
            inserts = batch.inserts.len(),
            updates = batch.updates.len(),
            deletes = batch.deletes.len(),
            "reconciled"
        );

        Ok(Plan {
            catalog,
            batch,
            warning,
        })
    }
}

fn item_ids(items: &[Item]) -> Vec<ItemId> {
    items.iter().map(|item| item.id().to_string()).collect()
}
