//! Mirror read handlers - current rows and the audit trail.

use crate::db;
use crate::error::{AppError, Result};
use crate::AppState;
use catalog_engine::{AuditEntry, Item};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rows returned by `GET /items` without a limit.
pub const DEFAULT_ITEMS_LIMIT: i64 = 100;

/// Audit entries returned by `GET /audit` without a limit.
pub const DEFAULT_AUDIT_LIMIT: i64 = 10;

/// Largest page either listing returns.
pub const MAX_LIMIT: i64 = 1000;

/// Query parameters for listings.
#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

impl LimitQuery {
    /// The requested limit, `default` when absent and capped at [`MAX_LIMIT`].
    pub fn resolve(&self, default: i64) -> Result<i64> {
        match self.limit {
            None => Ok(default),
            Some(limit) if limit < 1 => Err(AppError::BadRequest(
                "limit must be at least 1".to_string(),
            )),
            Some(limit) => Ok(limit.min(MAX_LIMIT)),
        }
    }
}

/// A mirror row as listed by `GET /items`: the remote record and its stamp.
#[derive(Debug, Serialize)]
pub struct MirrorRow {
    pub item_id: String,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub record: Item,
}

impl From<Item> for MirrorRow {
    fn from(item: Item) -> Self {
        Self {
            item_id: item.id().to_string(),
            last_synced_at: item.synced_at(),
            record: item,
        }
    }
}

/// Current mirror rows, ordered by key.
pub async fn handle_items(state: &AppState, query: LimitQuery) -> Result<Vec<MirrorRow>> {
    let limit = query.resolve(DEFAULT_ITEMS_LIMIT)?;
    db::select_items(&state.pool, &state.config.sync.tables.items, Some(limit))
        .await?
        .into_iter()
        .map(|row| row.into_item().map(MirrorRow::from).map_err(AppError::from))
        .collect()
}

/// Most recent audit entries, newest first.
pub async fn handle_audit(state: &AppState, query: LimitQuery) -> Result<Vec<AuditEntry>> {
    let limit = query.resolve(DEFAULT_AUDIT_LIMIT)?;
    let audit_table = &state.config.sync.tables.audit;
    let rows = db::recent_audit_entries(&state.pool, audit_table, limit).await?;
    rows.iter()
        .map(|row| row.to_entry().map_err(AppError::from))
        .collect()
}
