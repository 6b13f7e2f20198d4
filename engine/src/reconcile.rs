//! Reconciliation of a remote snapshot against the mirror.
//!
//! This is the core of the engine. Given the authoritative remote catalog and
//! the mirror's current contents, it produces the minimal set of actions that
//! makes the mirror match the remote catalog.
//!
//! # Algorithm
//!
//! 1. Both snapshots are indexed by `item_id`
//! 2. Each remote item missing from the mirror is an insert
//! 3. Each remote item whose fields differ from its mirror copy is an update
//!    (full-row replace)
//! 4. Each mirror item missing from the remote catalog is a delete
//!
//! Field comparison uses the remote item's field set as the basis. Fields that
//! only exist in the mirror copy are bookkeeping and never cause an update.
//!
//! Insert and update keys come from the remote snapshot; delete keys come from
//! `mirror \ remote`. The three collections are therefore disjoint.

use crate::{AuditEntry, ChangeType, Item, MirrorSnapshot, RemoteSnapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What to do with mirror items that are missing from the remote snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeletePolicy {
    /// Delete them (default). Correct when the remote snapshot is complete.
    #[default]
    Propagate,
    /// Keep them and only count them. Used when the remote snapshot was
    /// truncated by the page bound.
    Suppress,
}

/// The actions computed by one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionBatch {
    /// Remote items not present in the mirror
    pub inserts: Vec<Item>,
    /// Remote items whose mirror copy differs
    pub updates: Vec<Item>,
    /// Mirror items no longer present remotely
    pub deletes: Vec<Item>,
    /// Deletions withheld by [`DeletePolicy::Suppress`]
    pub deletes_suppressed: usize,
}

impl ActionBatch {
    /// Total number of actions.
    pub fn len(&self) -> usize {
        self.inserts.len() + self.updates.len() + self.deletes.len()
    }

    /// Check if there is nothing to apply.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One audit entry per action, all stamped with `changed_at`.
    ///
    /// Entries are ordered inserts, then updates, then deletes.
    pub fn audit_entries(&self, changed_at: DateTime<Utc>) -> Vec<AuditEntry> {
        let tagged = [
            (ChangeType::Insert, &self.inserts),
            (ChangeType::Update, &self.updates),
            (ChangeType::Delete, &self.deletes),
        ];

        tagged
            .into_iter()
            .flat_map(|(change, items)| {
                items
                    .iter()
                    .map(move |item| AuditEntry::new(change, item.id(), changed_at))
            })
            .collect()
    }
}

/// Computes action batches.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reconciler {
    policy: DeletePolicy,
}

impl Reconciler {
    /// Create a new reconciler.
    pub fn new(policy: DeletePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> DeletePolicy {
        self.policy
    }

    /// Diff `remote` against `mirror`.
    pub fn reconcile(&self, remote: &RemoteSnapshot, mirror: &MirrorSnapshot) -> ActionBatch {
        let mut batch = ActionBatch::default();

        for item in remote.iter() {
            match mirror.get(item.id()) {
                None => batch.inserts.push(item.clone()),
                Some(existing) if item.differs_from(existing) => {
                    batch.updates.push(item.clone())
                }
                Some(_) => {}
            }
        }

        let missing = mirror.iter().filter(|item| !remote.contains(item.id()));
        match self.policy {
            DeletePolicy::Propagate => batch.deletes.extend(missing.cloned()),
            DeletePolicy::Suppress => batch.deletes_suppressed = missing.count(),
        }

        batch
    }
}
