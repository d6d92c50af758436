//! Periodic removal of expired claims.
//!
//! Reads already filter expired claims; this keeps the store itself small
//! when nobody is polling.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use warboard_core::claim::ClaimStore;
use warboard_core::time::TimeSource;

/// Run the claim sweep loop until `cancel` is triggered.
pub async fn run(
    store: Arc<dyn ClaimStore>,
    time: Arc<dyn TimeSource>,
    every: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(
        interval_secs = every.as_secs(),
        backend = store.backend(),
        "Claim sweep job started"
    );

    let mut interval = tokio::time::interval(every);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Claim sweep job stopping");
                break;
            }
            _ = interval.tick() => {
                match store.sweep_expired(time.now_secs()).await {
                    Ok(removed) => {
                        if removed > 0 {
                            tracing::info!(removed, "Claim sweep: removed expired claims");
                        } else {
                            tracing::debug!("Claim sweep: nothing expired");
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Claim sweep: sweep failed");
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
