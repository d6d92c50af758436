//! Handlers for claiming and releasing targets.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use warboard_core::claim::{validate_claimer_name, validate_player_id, ClaimError, NewClaim};
use warboard_core::types::PlayerId;

use crate::error::AppResult;
use crate::query::{ClaimFilterParams, ClaimerParams};
use crate::response::{ClaimActionResponse, ClaimListResponse};
use crate::state::AppState;

/// Body of `POST /api/claim`.
#[derive(Debug, Deserialize)]
pub struct ClaimRequest {
    pub target_id: PlayerId,
    pub claimer_id: PlayerId,
    pub claimer_name: String,
}

// ---------------------------------------------------------------------------
// Claim / release
// ---------------------------------------------------------------------------

/// POST /api/claim
///
/// Claim a tracked target. The target must be in the current snapshot; its
/// display name is taken from there.
pub async fn claim_target(
    State(state): State<AppState>,
    payload: Result<Json<ClaimRequest>, JsonRejection>,
) -> AppResult<Json<ClaimActionResponse>> {
    let Json(input) = payload?;
    validate_player_id("target_id", input.target_id)?;
    validate_player_id("claimer_id", input.claimer_id)?;
    validate_claimer_name(&input.claimer_name)?;

    let view = state.cache.get_snapshot(false).await?;
    let target = view
        .snapshot
        .find(input.target_id)
        .ok_or(ClaimError::UnknownTarget(input.target_id))?;

    let request = NewClaim {
        target_id: input.target_id,
        target_name: target.name.clone(),
        claimer_id: input.claimer_id,
        claimer_name: input.claimer_name.trim().to_string(),
    };
    let grant = state.claims().claim(&request, state.time.now_secs()).await?;

    tracing::info!(
        target_id = request.target_id,
        claimer_id = request.claimer_id,
        expires_at = grant.claim().expires_at,
        outcome = grant.message(),
        "Target claimed",
    );

    Ok(Json(ClaimActionResponse::with_claim(
        grant.message(),
        grant.into_claim(),
    )))
}

/// DELETE /api/claim/{target_id}?claimer_id=<id>
///
/// Release the caller's own claim.
pub async fn release_claim(
    State(state): State<AppState>,
    Path(target_id): Path<PlayerId>,
    params: Result<Query<ClaimerParams>, QueryRejection>,
) -> AppResult<Json<ClaimActionResponse>> {
    let Query(params) = params?;
    validate_player_id("claimer_id", params.claimer_id)?;

    state
        .claims()
        .release(target_id, params.claimer_id, state.time.now_secs())
        .await?;

    tracing::info!(target_id, claimer_id = params.claimer_id, "Claim released");
    Ok(Json(ClaimActionResponse::ok("Claim released")))
}

/// POST /api/claim/{target_id}/resolve?claimer_id=<id>
///
/// Release the caller's claim after the attack landed.
pub async fn resolve_claim(
    State(state): State<AppState>,
    Path(target_id): Path<PlayerId>,
    params: Result<Query<ClaimerParams>, QueryRejection>,
) -> AppResult<Json<ClaimActionResponse>> {
    let Query(params) = params?;
    validate_player_id("claimer_id", params.claimer_id)?;

    state
        .claims()
        .resolve(target_id, params.claimer_id, state.time.now_secs())
        .await?;

    tracing::info!(target_id, claimer_id = params.claimer_id, "Claim resolved");
    Ok(Json(ClaimActionResponse::ok("Attack resolved, claim released")))
}

/// DELETE /api/admin/claim/{target_id}
///
/// Remove a claim regardless of who holds it.
pub async fn force_release_claim(
    State(state): State<AppState>,
    Path(target_id): Path<PlayerId>,
) -> AppResult<Json<ClaimActionResponse>> {
    let released = state
        .claims()
        .force_release(target_id, state.time.now_secs())
        .await?;

    tracing::warn!(
        target_id,
        claimer_id = released.claimer_id,
        "Claim force released"
    );
    Ok(Json(ClaimActionResponse::ok("Claim force released")))
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// GET /api/claims[?claimer_id=<id>]
///
/// List active claims, optionally only those held by one claimer.
///
/// Claims are retired against the cached capture, if there is one, the same
/// way `/api/status` does. Listing never triggers an upstream fetch.
pub async fn list_claims(
    State(state): State<AppState>,
    params: Result<Query<ClaimFilterParams>, QueryRejection>,
) -> AppResult<Json<ClaimListResponse>> {
    let Query(params) = params?;
    let now = state.time.now_secs();
    let mut claims = match state.cache.current().await {
        Some(capture) => state.reconciler.active_claims(&capture, now).await?,
        None => state.reconciler.current_claims(now).await?,
    };
    if let Some(claimer_id) = params.claimer_id {
        claims.retain(|c| c.claimer_id == claimer_id);
    }
    Ok(Json(ClaimListResponse::from(claims)))
}
