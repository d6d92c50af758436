pub mod claims;
pub mod health;
pub mod status;

use axum::Router;

use crate::state::AppState;

/// Build the `/api` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /status                              GET live snapshot (?force_refresh)
/// /stats                               GET cache, claim and upstream stats
///
/// /claim                               POST claim a target
/// /claim/{target_id}                   DELETE release own claim (?claimer_id)
/// /claim/{target_id}/resolve           POST release after attack (?claimer_id)
/// /claims                              GET active claims (?claimer_id)
///
/// /admin/claim/{target_id}             DELETE force release
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(status::router())
        .merge(claims::router())
}
