//! Shared target status cache.
//!
//! [`StatusCache`] holds the most recent [`TargetSnapshot`] behind an
//! `RwLock<Option<Arc<_>>>`. Readers clone the `Arc`; a refresh derives a
//! complete new snapshot and swaps the pointer, so a partially built
//! snapshot is never visible. Refreshes go through the
//! [`FreshnessCoordinator`] singleflight gate.

pub mod coordinator;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use tokio::sync::RwLock;
use warboard_core::snapshot::TargetSnapshot;
use warboard_core::source::StatusSource;
use warboard_core::target::{derive_targets, StatusPolicy};
use warboard_core::time::TimeSource;
use warboard_core::types::EpochMillis;

pub use coordinator::{FreshnessCoordinator, RefreshOutcome, RefreshPhase, RefreshResult};

/// Default freshness threshold.
pub const DEFAULT_FRESHNESS: Duration = Duration::from_secs(2);

/// Errors surfaced by [`StatusCache::get_snapshot`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// No snapshot has ever been built and upstream cannot be reached.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),
}

/// A snapshot plus its freshness at read time.
#[derive(Debug, Clone)]
pub struct CacheView {
    pub snapshot: Arc<TargetSnapshot>,
    pub age_secs: f64,
    /// True when the most recent refresh attempt failed.
    pub stale: bool,
    pub next_refresh_in: f64,
}

/// Counters exposed through `/api/stats`.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub refreshes: u64,
    pub failed_refreshes: u64,
    pub joined_waiters: u64,
    pub hit_rate: f64,
    pub phase: &'static str,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub snapshot_seq: Option<u64>,
    pub snapshot_age_seconds: Option<f64>,
    pub last_success_ms: Option<EpochMillis>,
    pub last_attempt_ms: Option<EpochMillis>,
    pub freshness_seconds: f64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    refreshes: AtomicU64,
    failed_refreshes: AtomicU64,
    joined: AtomicU64,
}

/// Stale-while-revalidate cache over a [`StatusSource`].
pub struct StatusCache {
    source: Arc<dyn StatusSource>,
    time: Arc<dyn TimeSource>,
    policy: StatusPolicy,
    freshness_ms: i64,
    current: Arc<RwLock<Option<Arc<TargetSnapshot>>>>,
    coordinator: FreshnessCoordinator,
    counters: Arc<Counters>,
}

impl StatusCache {
    pub fn new(
        source: Arc<dyn StatusSource>,
        time: Arc<dyn TimeSource>,
        policy: StatusPolicy,
        freshness: Duration,
    ) -> Self {
        Self {
            source,
            time,
            policy,
            freshness_ms: freshness.as_millis() as i64,
            current: Arc::new(RwLock::new(None)),
            coordinator: FreshnessCoordinator::new(),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn freshness(&self) -> Duration {
        Duration::from_millis(self.freshness_ms.max(0) as u64)
    }

    /// The last published snapshot, if any.
    pub async fn current(&self) -> Option<Arc<TargetSnapshot>> {
        self.current.read().await.clone()
    }

    /// Upstream requests left in the current rate-limit window.
    pub async fn requests_remaining(&self) -> u32 {
        self.source.requests_remaining().await
    }

    /// Return a snapshot, refreshing from upstream when it is older than the
    /// freshness threshold or `force_refresh` is set.
    ///
    /// Refresh failures are absorbed while a previous snapshot exists; only
    /// a cold start surfaces [`CacheError::UpstreamUnavailable`].
    pub async fn get_snapshot(&self, force_refresh: bool) -> Result<CacheView, CacheError> {
        let now_ms = self.time.now_millis();
        if !force_refresh {
            if let Some(snapshot) = self.current().await {
                if now_ms - snapshot.captured_at_ms < self.freshness_ms {
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(self.view(snapshot, false));
                }
            }
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);

        let time = Arc::clone(&self.time);
        let outcome = self
            .coordinator
            .trigger(
                force_refresh,
                now_ms,
                self.freshness_ms,
                || self.refresh_task(),
                move || time.now_millis(),
            )
            .await;

        let result = match outcome {
            RefreshOutcome::AlreadyFresh => {
                let status = self.coordinator.status().await;
                let stale = matches!(status.phase, RefreshPhase::Failed { .. });
                return match self.current().await {
                    Some(snapshot) => Ok(self.view(snapshot, stale)),
                    None => Err(CacheError::UpstreamUnavailable(match status.phase {
                        RefreshPhase::Failed { last_error, .. } => last_error,
                        _ => "no snapshot available".to_string(),
                    })),
                };
            }
            RefreshOutcome::Led(result) => result,
            RefreshOutcome::Joined(result) => {
                self.counters.joined.fetch_add(1, Ordering::Relaxed);
                result
            }
        };

        match result {
            Ok(snapshot) => Ok(self.view(snapshot, false)),
            Err(e) => match self.current().await {
                Some(previous) => Ok(self.view(previous, true)),
                None => Err(CacheError::UpstreamUnavailable(e.to_string())),
            },
        }
    }

    pub async fn stats(&self) -> CacheStats {
        let status = self.coordinator.status().await;
        let current = self.current().await;
        let now_ms = self.time.now_millis();

        let hits = self.counters.hits.load(Ordering::Relaxed);
        let misses = self.counters.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let (consecutive_failures, last_error) = match &status.phase {
            RefreshPhase::Failed {
                consecutive,
                last_error,
            } => (*consecutive, Some(last_error.clone())),
            _ => (0, None),
        };

        CacheStats {
            hits,
            misses,
            refreshes: self.counters.refreshes.load(Ordering::Relaxed),
            failed_refreshes: self.counters.failed_refreshes.load(Ordering::Relaxed),
            joined_waiters: self.counters.joined.load(Ordering::Relaxed),
            hit_rate: if total > 0 { hits as f64 / total as f64 } else { 0.0 },
            phase: status.phase.name(),
            consecutive_failures,
            last_error,
            snapshot_seq: current.as_ref().map(|s| s.seq),
            snapshot_age_seconds: current.as_ref().map(|s| s.age_secs(now_ms)),
            last_success_ms: status.last_success_ms,
            last_attempt_ms: status.last_attempt_ms,
            freshness_seconds: self.freshness_ms as f64 / 1000.0,
        }
    }

    fn view(&self, snapshot: Arc<TargetSnapshot>, stale: bool) -> CacheView {
        let now_ms = self.time.now_millis();
        let age_ms = (now_ms - snapshot.captured_at_ms).max(0);
        CacheView {
            age_secs: snapshot.age_secs(now_ms),
            stale,
            next_refresh_in: (self.freshness_ms - age_ms).max(0) as f64 / 1000.0,
            snapshot,
        }
    }

    /// Build the future that fetches, derives and publishes one snapshot.
    fn refresh_task(&self) -> BoxFuture<'static, RefreshResult> {
        let source = Arc::clone(&self.source);
        let time = Arc::clone(&self.time);
        let current = Arc::clone(&self.current);
        let counters = Arc::clone(&self.counters);
        let policy = self.policy;

        async move {
            let started_ms = time.now_millis();
            let records = match source.fetch_roster().await {
                Ok(records) => records,
                Err(e) => {
                    counters.failed_refreshes.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(error = %e, "Status refresh failed, serving previous snapshot");
                    return Err(e);
                }
            };

            let mut slot = current.write().await;
            let captured_at_ms: EpochMillis = time.now_millis();
            let previous = slot.as_deref();
            let targets = derive_targets(
                &records,
                previous.map(|s| s.targets.as_slice()).unwrap_or(&[]),
                captured_at_ms.div_euclid(1000),
                &policy,
            );
            let snapshot = Arc::new(TargetSnapshot {
                seq: previous.map_or(1, |s| s.seq + 1),
                captured_at_ms,
                targets,
            });
            *slot = Some(Arc::clone(&snapshot));
            drop(slot);

            counters.refreshes.fetch_add(1, Ordering::Relaxed);
            tracing::info!(
                seq = snapshot.seq,
                targets = snapshot.targets.len(),
                fetch_ms = captured_at_ms - started_ms,
                "Status snapshot published"
            );
            Ok(snapshot)
        }
        .boxed()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
