//! # Catalog Engine
//!
//! A reconciliation engine that keeps a local mirror table in step with a
//! remote item catalog.
//!
//! The engine takes a freshly fetched, authoritative set of items and the set
//! currently mirrored locally, computes the minimal set of inserts, updates and
//! deletes, applies them through a [`MirrorStore`], and leaves behind an
//! append-only audit trail plus a per-table [`SyncMetadata`] row.
//!
//! ## Design Principles
//!
//! - **No IO**: The engine never opens a socket or a database connection. The
//!   remote catalog and the mirror table are reached through the
//!   [`RemoteSource`] and [`MirrorStore`] traits.
//! - **Deterministic**: Timestamps are passed in by the caller, and batches
//!   follow the insertion order of the snapshots they came from.
//! - **Idempotent**: Re-running a cycle against an unchanged remote catalog
//!   produces an empty batch.
//! - **Bounded**: Pagination stops after a configurable page count and reports
//!   a [`PartialFetchWarning`] instead of trusting a truncated catalog.
//!
//! ## Core Concepts
//!
//! ### Items and Snapshots
//!
//! An [`Item`] is a flat map of named fields keyed by its `item_id`. A
//! [`Snapshot`] is an insertion-ordered, key-indexed set of items with unique
//! keys. Remote snapshots are collected leniently (records without a usable key
//! are skipped and reported); mirror snapshots are built strictly.
//!
//! ### Reconciliation
//!
//! The [`Reconciler`] compares every field of a remote item against its mirror
//! copy. Fields that only exist in the mirror copy are ignored, so they never
//! produce an update. The mirror's sync stamp is kept outside the field map
//! entirely (see [`Item::synced_at`]).
//!
//! ### Sync Cycles
//!
//! A [`SyncCycle`] runs fetch, read, reconcile, apply, audit and metadata in
//! that order. Any fatal failure is a [`SyncError`] naming the failed
//! [`SyncPhase`] and the counts processed before it.
//!
//! ## Quick Start
//!
//! ```rust
//! use catalog_engine::{Item, Reconciler, Snapshot};
//! use serde_json::json;
//!
//! let mirror = Snapshot::from_items(vec![
//!     Item::from_value(json!({"item_id": "1", "name": "Widget", "rate": 10})).unwrap(),
//!     Item::from_value(json!({"item_id": "2", "name": "Gadget", "rate": 20})).unwrap(),
//! ])
//! .unwrap();
//!
//! let remote = Snapshot::from_items(vec![
//!     Item::from_value(json!({"item_id": "1", "name": "Widget", "rate": 12})).unwrap(),
//!     Item::from_value(json!({"item_id": "3", "name": "Gizmo", "rate": 5})).unwrap(),
//! ])
//! .unwrap();
//!
//! let batch = Reconciler::default().reconcile(&remote, &mirror);
//! assert_eq!(batch.inserts[0].id(), "3");
//! assert_eq!(batch.updates[0].id(), "1");
//! assert_eq!(batch.deletes[0].id(), "2");
//! ```

pub mod apply;
pub mod audit;
pub mod error;
pub mod item;
pub mod mirror;
pub mod reconcile;
pub mod snapshot;
pub mod source;
pub mod sync;

// Re-export main types at crate root
pub use apply::{apply, AppliedResult, ApplyFailure, MirrorTables};
pub use audit::{AuditEntry, ChangeType, SyncMetadata};
pub use error::Error;
pub use item::{Item, ITEM_ID_FIELD};
pub use mirror::{MemoryMirror, MemoryStoreError, MirrorOp, MirrorStore};
pub use reconcile::{ActionBatch, DeletePolicy, Reconciler};
pub use snapshot::{MirrorSnapshot, RemoteCollector, RemoteSnapshot, SkippedRecord, Snapshot};
pub use source::{
    fetch_all, FetchFailure, FetchedCatalog, MemorySource, MemorySourceError, Page, RemoteSource,
};
pub use sync::{
    PartialFetchWarning, SyncCycle, SyncError, SyncOptions, SyncPhase, SyncPreview, SyncReport,
    DEFAULT_MAX_PAGES,
};

/// Type aliases for clarity
pub type ItemId = String;
pub type TableName = String;
pub type PageNumber = u32;
