//! Shared query parameter types for API handlers.

use serde::Deserialize;
use warboard_core::types::PlayerId;

/// `?force_refresh=` on the status feed.
#[derive(Debug, Deserialize)]
pub struct ForceRefreshParams {
    #[serde(default)]
    pub force_refresh: bool,
}

/// `?claimer_id=` identifying the caller on release/resolve.
#[derive(Debug, Deserialize)]
pub struct ClaimerParams {
    pub claimer_id: PlayerId,
}

/// Optional `?claimer_id=` filter on the claim list.
#[derive(Debug, Deserialize)]
pub struct ClaimFilterParams {
    pub claimer_id: Option<PlayerId>,
}
