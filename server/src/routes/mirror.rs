//! Mirror read routes.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use catalog_engine::AuditEntry;

use crate::error::Result;
use crate::handlers::{handle_audit, handle_items, LimitQuery, MirrorRow};
use crate::AppState;

/// Create mirror routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/items", get(items_handler))
        .route("/audit", get(audit_handler))
}

/// GET /items - Current mirror rows.
async fn items_handler(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<MirrorRow>>> {
    let items = handle_items(&state, query).await?;
    Ok(Json(items))
}

/// GET /audit - Most recent audit entries.
async fn audit_handler(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<AuditEntry>>> {
    let entries = handle_audit(&state, query).await?;
    Ok(Json(entries))
}
