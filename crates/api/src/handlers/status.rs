//! Handler for the live status feed.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use warboard_core::snapshot::{Snapshot, SnapshotMeta};

use crate::error::AppResult;
use crate::query::ForceRefreshParams;
use crate::state::AppState;

/// GET /api/status?force_refresh=<bool>
///
/// Returns the current snapshot, annotated with claims as of one read of the
/// claim store.
pub async fn get_status(
    State(state): State<AppState>,
    params: Result<Query<ForceRefreshParams>, QueryRejection>,
) -> AppResult<Json<Snapshot>> {
    let Query(params) = params?;
    let view = state.cache.get_snapshot(params.force_refresh).await?;

    let meta = SnapshotMeta {
        cache_age_seconds: view.age_secs,
        stale: view.stale,
        next_refresh_in: view.next_refresh_in,
        max_claims_per_user: state.claims().policy().max_per_claimer,
        api_calls_remaining: state.cache.requests_remaining().await,
    };
    let snapshot = state
        .reconciler
        .reconcile(&view.snapshot, state.time.now_secs(), meta)
        .await?;

    Ok(Json(snapshot))
}
