//! Audit trail and sync metadata rows.

use crate::{AppliedResult, Error, ItemId, TableName};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of change recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeType {
    Insert,
    Update,
    Delete,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Insert => "INSERT",
            ChangeType::Update => "UPDATE",
            ChangeType::Delete => "DELETE",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INSERT" => Ok(ChangeType::Insert),
            "UPDATE" => Ok(ChangeType::Update),
            "DELETE" => Ok(ChangeType::Delete),
            other => Err(Error::UnknownChangeType(other.to_string())),
        }
    }
}

/// One immutable row of the audit trail.
///
/// All entries written by one cycle share the same `changed_at`, so a reader
/// can group the trail by cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub change_type: ChangeType,
    pub item_id: ItemId,
    pub changed_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        change_type: ChangeType,
        item_id: impl Into<ItemId>,
        changed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            change_type,
            item_id: item_id.into(),
            changed_at,
        }
    }
}

/// Summary row of the most recent cycle for one mirrored table.
///
/// Upserted by `table_name`; it is not a history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMetadata {
    pub table_name: TableName,
    pub last_synced_at: DateTime<Utc>,
    pub inserted_count: u64,
    pub updated_count: u64,
    pub deleted_count: u64,
}

impl SyncMetadata {
    /// Build the metadata row for a cycle that applied `applied`.
    pub fn for_cycle(
        table_name: impl Into<TableName>,
        synced_at: DateTime<Utc>,
        applied: &AppliedResult,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            last_synced_at: synced_at,
            inserted_count: applied.inserted_count,
            updated_count: applied.updated_count,
            deleted_count: applied.deleted_count,
        }
    }
}
