//! Handler for operational statistics.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::cache::CacheStats;
use crate::error::AppResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ClaimStats {
    pub backend: &'static str,
    pub active_claims: usize,
    pub ttl_secs: i64,
    pub max_claims_per_user: usize,
}

#[derive(Debug, Serialize)]
pub struct UpstreamStats {
    pub requests_remaining: u32,
    pub rate_limit_per_minute: u32,
    pub faction_ids: Vec<i64>,
    pub api_keys: usize,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub cache: CacheStats,
    pub claims: ClaimStats,
    pub upstream: UpstreamStats,
    pub timestamp: i64,
}

/// GET /api/stats
pub async fn get_stats(State(state): State<AppState>) -> AppResult<Json<StatsResponse>> {
    let now = state.time.now_secs();
    let store = state.claims();
    let active = store.list_active(now).await?;
    let policy = store.policy();
    let torn = &state.config.torn;

    Ok(Json(StatsResponse {
        cache: state.cache.stats().await,
        claims: ClaimStats {
            backend: store.backend(),
            active_claims: active.len(),
            ttl_secs: policy.ttl_secs,
            max_claims_per_user: policy.max_per_claimer,
        },
        upstream: UpstreamStats {
            requests_remaining: state.cache.requests_remaining().await,
            rate_limit_per_minute: torn.rate_limit_per_minute,
            faction_ids: torn.faction_ids.clone(),
            api_keys: torn.api_keys.len(),
        },
        timestamp: now,
    }))
}
