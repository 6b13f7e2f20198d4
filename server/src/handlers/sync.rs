//! Sync handlers - run or preview one reconciliation cycle.

use crate::db::{self, PgMirror};
use crate::error::{AppError, Result};
use crate::AppState;
use catalog_engine::{SyncCycle, SyncMetadata, SyncPreview, SyncReport};
use chrono::Utc;
use tracing::{debug, info_span, Instrument};
use uuid::Uuid;

/// Run one full cycle against the configured mirror tables.
///
/// Cycles are serialized: a request arriving while a cycle runs waits for it
/// to finish, then runs its own. The cycle runs as its own task, so it
/// completes even when the caller disconnects before the response is sent.
pub async fn handle_sync(state: &AppState) -> Result<SyncReport> {
    let cycle_id = Uuid::new_v4();
    let lock = state.sync_lock.clone();
    let config = state.config.clone();
    let mut source = state.zoho.clone();
    let mut mirror = PgMirror::new(state.pool.clone());

    let cycle = tokio::spawn(
        async move {
            let _running = lock.lock_owned().await;
            debug!("acquired sync lock");

            SyncCycle::new(&mut source, &mut mirror, &config.sync)
                .run(Utc::now())
                .await
        }
        .instrument(info_span!("sync_request", %cycle_id)),
    );

    Ok(cycle.await??)
}

/// Fetch and reconcile without writing to the mirror.
pub async fn handle_preview(state: &AppState) -> Result<SyncPreview> {
    let cycle_id = Uuid::new_v4();

    async move {
        let mut source = state.zoho.clone();
        let mut mirror = PgMirror::new(state.pool.clone());
        let preview = SyncCycle::new(&mut source, &mut mirror, &state.config.sync)
            .preview()
            .await?;

        Ok(preview)
    }
    .instrument(info_span!("preview_request", %cycle_id))
    .await
}

/// The metadata row left by the most recent completed cycle.
pub async fn handle_metadata(state: &AppState) -> Result<SyncMetadata> {
    let tables = &state.config.sync.tables;
    db::get_metadata(&state.pool, &tables.metadata, &tables.items)
        .await?
        .map(|row| row.into_metadata())
        .ok_or_else(|| {
            AppError::NotFound(format!("no completed sync for table {}", tables.items))
        })
}
