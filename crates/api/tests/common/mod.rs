use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;
use warboard_core::claim::{ClaimPolicy, ClaimStore};
use warboard_core::memory_store::InMemoryClaimStore;
use warboard_core::reconcile::ClaimReconciler;
use warboard_core::source::{SourceError, StatusSource};
use warboard_core::target::{MemberRecord, StatusPolicy};
use warboard_core::time::ManualTimeSource;
use warboard_core::types::{EpochSecs, PlayerId};
use warboard_torn::source::TornConfig;

use warboard_api::cache::StatusCache;
use warboard_api::config::{ClaimBackend, ServerConfig};
use warboard_api::router::build_app_router;
use warboard_api::state::AppState;

/// Start of test time (epoch seconds).
pub const T0: EpochSecs = 1_700_000_000;

// ---------------------------------------------------------------------------
// Fake upstream
// ---------------------------------------------------------------------------

/// Scriptable [`StatusSource`] that counts fetches.
pub struct FakeSource {
    roster: Mutex<Vec<MemberRecord>>,
    failing: AtomicBool,
    delay: Mutex<Duration>,
    fetches: AtomicUsize,
}

impl FakeSource {
    pub fn new(roster: Vec<MemberRecord>) -> Self {
        Self {
            roster: Mutex::new(roster),
            failing: AtomicBool::new(false),
            delay: Mutex::new(Duration::ZERO),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn set_roster(&self, roster: Vec<MemberRecord>) {
        *self.roster.lock().unwrap() = roster;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusSource for FakeSource {
    async fn fetch_roster(&self) -> Result<Vec<MemberRecord>, SourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(SourceError::Api {
                code: 5,
                message: "Too many requests".to_string(),
            });
        }
        Ok(self.roster.lock().unwrap().clone())
    }

    async fn requests_remaining(&self) -> u32 {
        90u32.saturating_sub(self.fetches() as u32)
    }
}

/// A member who is out of hospital.
pub fn member_out(id: PlayerId) -> MemberRecord {
    MemberRecord {
        user_id: id,
        name: format!("Target{id}"),
        level: 50,
        state: "Okay".to_string(),
        description: "Okay".to_string(),
        until: 0,
        last_action_ts: Some(T0 - 30),
        last_action_relative: "30 seconds ago".to_string(),
    }
}

/// A member in hospital until `until` (already offset-corrected).
pub fn member_in_hospital(id: PlayerId, until: EpochSecs) -> MemberRecord {
    MemberRecord {
        state: "Hospital".to_string(),
        description: "In hospital".to_string(),
        until,
        ..member_out(id)
    }
}

// ---------------------------------------------------------------------------
// App construction
// ---------------------------------------------------------------------------

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        claim_backend: ClaimBackend::Memory,
        database_url: None,
        claims: ClaimPolicy {
            ttl_secs: 120,
            max_per_claimer: 3,
        },
        claim_sweep_interval_secs: 0,
        cache_freshness: Duration::from_secs(2),
        background_refresh_secs: 0,
        status_policy: StatusPolicy {
            hospital_until_offset_secs: 0,
            ..StatusPolicy::default()
        },
        torn: TornConfig {
            faction_ids: vec![9001],
            ..TornConfig::default()
        },
    }
}

/// Everything a test needs to drive the app and its collaborators.
pub struct TestApp {
    pub router: Router,
    pub source: Arc<FakeSource>,
    pub time: Arc<ManualTimeSource>,
    pub store: Arc<InMemoryClaimStore>,
    pub cache: Arc<StatusCache>,
}

/// Build the full application router over a fake upstream, an in-memory
/// claim store and a manual clock starting at [`T0`].
pub fn build_test_app(roster: Vec<MemberRecord>) -> TestApp {
    let config = test_config();
    let source = Arc::new(FakeSource::new(roster));
    let time = Arc::new(ManualTimeSource::at_secs(T0));
    let store = Arc::new(InMemoryClaimStore::new(config.claims));
    let cache = Arc::new(StatusCache::new(
        source.clone(),
        time.clone(),
        config.status_policy,
        config.cache_freshness,
    ));

    let claims: Arc<dyn ClaimStore> = store.clone();
    let state = AppState {
        config: Arc::new(config.clone()),
        cache: Arc::clone(&cache),
        reconciler: ClaimReconciler::new(claims),
        time: time.clone(),
    };

    TestApp {
        router: build_app_router(state, &config),
        source,
        time,
        store,
        cache,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response {
    send(app, Method::GET, uri, None).await
}

pub async fn delete(app: Router, uri: &str) -> Response {
    send(app, Method::DELETE, uri, None).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    send(app, Method::POST, uri, Some(body)).await
}

async fn send(app: Router, method: Method, uri: &str, body: Option<serde_json::Value>) -> Response {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// POST /api/claim body.
pub fn claim_body(target_id: PlayerId, claimer_id: PlayerId) -> serde_json::Value {
    serde_json::json!({
        "target_id": target_id,
        "claimer_id": claimer_id,
        "claimer_name": format!("User{claimer_id}"),
    })
}
