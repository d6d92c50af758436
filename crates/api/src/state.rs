use std::sync::Arc;

use warboard_core::claim::ClaimStore;
use warboard_core::reconcile::ClaimReconciler;
use warboard_core::time::TimeSource;

use crate::cache::StatusCache;
use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Shared target status cache.
    pub cache: Arc<StatusCache>,
    /// Claim store wrapped with read-time reconciliation.
    pub reconciler: ClaimReconciler,
    /// Wall clock used for claim expiry.
    pub time: Arc<dyn TimeSource>,
}

impl AppState {
    pub fn claims(&self) -> &Arc<dyn ClaimStore> {
        self.reconciler.store()
    }
}
