use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::claims;
use crate::state::AppState;

/// Mount claim routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/claim", post(claims::claim_target))
        .route("/claim/{target_id}", delete(claims::release_claim))
        .route("/claim/{target_id}/resolve", post(claims::resolve_claim))
        .route("/claims", get(claims::list_claims))
        .route("/admin/claim/{target_id}", delete(claims::force_release_claim))
}
