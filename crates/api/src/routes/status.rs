use axum::routing::get;
use axum::Router;

use crate::handlers::{stats, status};
use crate::state::AppState;

/// Mount the status feed and stats routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/status", get(status::get_status))
        .route("/stats", get(stats::get_stats))
}
