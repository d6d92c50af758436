//! Singleflight gate for upstream refreshes.
//!
//! At most one refresh runs at a time. Callers arriving while one is in
//! flight attach to it and share its result. The refresh itself runs in a
//! spawned task, so a caller dropping its request never cancels work other
//! waiters depend on.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use tokio::sync::Mutex;
use warboard_core::snapshot::TargetSnapshot;
use warboard_core::source::SourceError;
use warboard_core::types::EpochMillis;

/// Result shared by every waiter of one refresh.
pub type RefreshResult = Result<Arc<TargetSnapshot>, SourceError>;

type SharedRefresh = Shared<BoxFuture<'static, RefreshResult>>;

/// Lifecycle of the coordinator. There is no terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshPhase {
    Idle,
    Refreshing,
    /// The last refresh failed. Behaves like `Idle` for the next trigger.
    Failed {
        consecutive: u32,
        last_error: String,
    },
}

impl RefreshPhase {
    pub fn name(&self) -> &'static str {
        match self {
            RefreshPhase::Idle => "idle",
            RefreshPhase::Refreshing => "refreshing",
            RefreshPhase::Failed { .. } => "failed",
        }
    }
}

/// How a trigger was resolved.
#[derive(Debug)]
pub enum RefreshOutcome {
    /// A refresh finished within the freshness window; nothing was started.
    AlreadyFresh,
    /// This caller started the refresh and awaited it.
    Led(RefreshResult),
    /// This caller attached to a refresh already in flight.
    Joined(RefreshResult),
}

/// Point-in-time view of the coordinator, for stats and staleness.
#[derive(Debug, Clone)]
pub struct CoordinatorStatus {
    pub phase: RefreshPhase,
    /// Wall-clock millis of the last successful refresh.
    pub last_success_ms: Option<EpochMillis>,
    /// Wall-clock millis at which the last refresh (any outcome) finished.
    pub last_attempt_ms: Option<EpochMillis>,
}

struct Inner {
    phase: RefreshPhase,
    in_flight: Option<SharedRefresh>,
    last_success_ms: Option<EpochMillis>,
    last_attempt_ms: Option<EpochMillis>,
}

/// Serializes refresh attempts from readers and the background tick.
#[derive(Clone)]
pub struct FreshnessCoordinator {
    inner: Arc<Mutex<Inner>>,
}

impl Default for FreshnessCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl FreshnessCoordinator {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                phase: RefreshPhase::Idle,
                in_flight: None,
                last_success_ms: None,
                last_attempt_ms: None,
            })),
        }
    }

    pub async fn status(&self) -> CoordinatorStatus {
        let inner = self.inner.lock().await;
        CoordinatorStatus {
            phase: inner.phase.clone(),
            last_success_ms: inner.last_success_ms,
            last_attempt_ms: inner.last_attempt_ms,
        }
    }

    /// Join the in-flight refresh, or start one with `start`.
    ///
    /// A non-forced trigger is dropped when the last refresh finished less
    /// than `window_ms` before `now_ms`, which covers a refresh completing
    /// between the caller's own freshness check and this gate. `finished_at`
    /// is called when the refresh completes to stamp the attempt time.
    pub async fn trigger<S, C>(
        &self,
        force: bool,
        now_ms: EpochMillis,
        window_ms: i64,
        start: S,
        finished_at: C,
    ) -> RefreshOutcome
    where
        S: FnOnce() -> BoxFuture<'static, RefreshResult>,
        C: Fn() -> EpochMillis + Send + 'static,
    {
        let (flight, led) = {
            let mut inner = self.inner.lock().await;
            if let Some(flight) = &inner.in_flight {
                (flight.clone(), false)
            } else if !force
                && inner
                    .last_attempt_ms
                    .is_some_and(|at| now_ms - at < window_ms)
            {
                return RefreshOutcome::AlreadyFresh;
            } else {
                let flight = self.spawn_refresh(start(), finished_at);
                inner.phase = RefreshPhase::Refreshing;
                inner.in_flight = Some(flight.clone());
                (flight, true)
            }
        };

        let result = flight.await;
        if led {
            RefreshOutcome::Led(result)
        } else {
            RefreshOutcome::Joined(result)
        }
    }

    fn spawn_refresh<C>(&self, refresh: BoxFuture<'static, RefreshResult>, finished_at: C) -> SharedRefresh
    where
        C: Fn() -> EpochMillis + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let result = match AssertUnwindSafe(refresh).catch_unwind().await {
                Ok(result) => result,
                Err(_) => Err(SourceError::Transport("refresh task panicked".to_string())),
            };

            let mut inner = inner.lock().await;
            let finished = finished_at();
            inner.in_flight = None;
            inner.last_attempt_ms = Some(finished);
            match &result {
                Ok(_) => {
                    inner.phase = RefreshPhase::Idle;
                    inner.last_success_ms = Some(finished);
                }
                Err(e) => {
                    let consecutive = match &inner.phase {
                        RefreshPhase::Failed { consecutive, .. } => consecutive + 1,
                        _ => 1,
                    };
                    inner.phase = RefreshPhase::Failed {
                        consecutive,
                        last_error: e.to_string(),
                    };
                }
            }
            result
        });

        async move {
            match task.await {
                Ok(result) => result,
                Err(e) => Err(SourceError::Transport(format!("refresh task aborted: {e}"))),
            }
        }
        .boxed()
        .shared()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
