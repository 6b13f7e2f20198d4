//! Sync endpoint routes.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use catalog_engine::{SyncMetadata, SyncPreview, SyncReport};

use crate::auth::SyncAuth;
use crate::error::Result;
use crate::handlers::{handle_metadata, handle_preview, handle_sync};
use crate::AppState;

/// Create sync routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sync", post(sync_handler))
        .route("/sync/preview", get(preview_handler))
        .route("/sync/metadata", get(metadata_handler))
}

/// POST /sync - Run one reconciliation cycle.
async fn sync_handler(
    State(state): State<AppState>,
    _auth: SyncAuth,
) -> Result<Json<SyncReport>> {
    let report = handle_sync(&state).await?;
    Ok(Json(report))
}

/// GET /sync/preview - Compute the next cycle's changes without applying them.
async fn preview_handler(
    State(state): State<AppState>,
    _auth: SyncAuth,
) -> Result<Json<SyncPreview>> {
    let preview = handle_preview(&state).await?;
    Ok(Json(preview))
}

/// GET /sync/metadata - Summary of the last completed cycle.
async fn metadata_handler(State(state): State<AppState>) -> Result<Json<SyncMetadata>> {
    let metadata = handle_metadata(&state).await?;
    Ok(Json(metadata))
}
