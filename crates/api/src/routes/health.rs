use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthReport {
    /// `ok`, or `degraded` when the claim backend is unreachable.
    pub status: &'static str,
    pub version: &'static str,
    /// `null` until the first successful refresh.
    pub snapshot_age_seconds: Option<f64>,
    pub claim_backend: &'static str,
    pub claim_backend_healthy: bool,
}

/// GET /health
///
/// Liveness plus claim backend reachability. Never calls upstream.
async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    let store = state.claims();
    let claim_backend_healthy = match store.health_check().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(backend = store.backend(), error = %e, "Claim backend unhealthy");
            false
        }
    };
    let snapshot_age_seconds = state
        .cache
        .current()
        .await
        .map(|snapshot| snapshot.age_secs(state.time.now_millis()));

    Json(HealthReport {
        status: if claim_backend_healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        snapshot_age_seconds,
        claim_backend: store.backend(),
        claim_backend_healthy,
    })
}

/// Root-level health route, mounted outside `/api`.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
