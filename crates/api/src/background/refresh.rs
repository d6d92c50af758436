//! Keeps the status cache warm without reader traffic.
//!
//! Each tick goes through the same singleflight gate as readers, so a tick
//! landing during a reader-triggered refresh simply joins it.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::cache::StatusCache;

/// Run the background refresh loop until `cancel` is triggered.
pub async fn run(cache: Arc<StatusCache>, every: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = every.as_secs(), "Background refresh started");

    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Background refresh stopping");
                break;
            }
            _ = interval.tick() => {
                match cache.get_snapshot(false).await {
                    Ok(view) => tracing::debug!(
                        seq = view.snapshot.seq,
                        age_secs = view.age_secs,
                        stale = view.stale,
                        "Background refresh tick"
                    ),
                    Err(e) => tracing::warn!(error = %e, "Background refresh: no snapshot yet"),
                }
            }
        }
    }
}
