//! Error types for the catalog engine.

use crate::ItemId;
use thiserror::Error;

/// Validation and invariant errors raised by the engine itself.
///
/// Adapter failures are not represented here; they travel inside
/// [`SyncError`](crate::SyncError) with the phase they interrupted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Validation errors
    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("record has no item_id")]
    MissingItemId,

    #[error("invalid item_id: {0}")]
    InvalidItemId(String),

    #[error("unknown change type: {0}")]
    UnknownChangeType(String),

    // Snapshot errors
    #[error("duplicate item_id in snapshot: {0}")]
    DuplicateItemId(ItemId),

    // Configuration errors
    #[error("invalid sync option: {0}")]
    InvalidOption(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
