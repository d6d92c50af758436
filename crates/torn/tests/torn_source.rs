//! Integration tests for `TornSource` against a local mock of the upstream API.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use warboard_core::source::{SourceError, StatusSource};
use warboard_torn::source::{TornConfig, TornSource};

#[derive(Clone, Default)]
struct MockState {
    hits: Arc<AtomicUsize>,
    keys_seen: Arc<tokio::sync::Mutex<Vec<String>>>,
}

async fn faction_handler(
    State(state): State<MockState>,
    Path(faction_id): Path<i64>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    let key = params.get("key").cloned().unwrap_or_default();
    state.keys_seen.lock().await.push(key.clone());

    if key == "bad" {
        return Json(json!({"error": {"code": 2, "error": "Incorrect key"}})).into_response();
    }
    match faction_id {
        100 => Json(json!({
            "ID": 100,
            "name": "Red",
            "members": {
                "11": {
                    "name": "Eleven",
                    "level": 20,
                    "status": {"description": "Okay", "state": "Okay", "until": 0},
                    "last_action": {"timestamp": 1700000000, "relative": "1 minute ago"}
                }
            }
        }))
        .into_response(),
        200 => Json(json!({
            "ID": 200,
            "name": "Blue",
            "members": {
                "22": {
                    "name": "TwentyTwo",
                    "level": 30,
                    "status": {"description": "In hospital", "state": "Hospital", "until": 1700003700},
                    "last_action": {"timestamp": 1699999000, "relative": "16 minutes ago"}
                }
            }
        }))
        .into_response(),
        _ => (StatusCode::BAD_GATEWAY, "upstream down").into_response(),
    }
}

async fn spawn_mock() -> (String, MockState) {
    let state = MockState::default();
    let app = Router::new()
        .route("/faction/{faction_id}", get(faction_handler))
        .with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), state)
}

fn config(base_url: &str, keys: &[&str], factions: &[i64]) -> TornConfig {
    TornConfig {
        base_url: base_url.to_string(),
        api_keys: keys.iter().map(|k| k.to_string()).collect(),
        faction_ids: factions.to_vec(),
        rate_limit_per_minute: 90,
        request_timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn roster_combines_all_factions() {
    let (base, mock) = spawn_mock().await;
    let source = TornSource::new(config(&base, &["k1"], &[100, 200])).unwrap();

    let roster = source.fetch_roster().await.unwrap();
    let ids: Vec<_> = roster.iter().map(|m| m.user_id).collect();
    assert_eq!(ids, vec![11, 22]);
    assert_eq!(roster[1].state, "Hospital");
    assert_eq!(roster[1].until, 1_700_003_700);
    assert_eq!(mock.hits.load(Ordering::SeqCst), 2);
    assert_eq!(source.requests_remaining().await, 88);
}

#[tokio::test]
async fn keys_rotate_between_requests() {
    let (base, mock) = spawn_mock().await;
    let source = TornSource::new(config(&base, &["k1", "k2"], &[100, 200])).unwrap();

    source.fetch_roster().await.unwrap();
    assert_eq!(*mock.keys_seen.lock().await, vec!["k1", "k2"]);
}

#[tokio::test]
async fn upstream_error_envelope_fails_roster() {
    let (base, _mock) = spawn_mock().await;
    let source = TornSource::new(config(&base, &["bad"], &[100])).unwrap();

    let err = source.fetch_roster().await.unwrap_err();
    assert_matches!(err, SourceError::Api { code: 2, .. });
}

#[tokio::test]
async fn one_failing_faction_fails_whole_roster() {
    let (base, _mock) = spawn_mock().await;
    let source = TornSource::new(config(&base, &["k1"], &[100, 999])).unwrap();

    let err = source.fetch_roster().await.unwrap_err();
    assert_matches!(err, SourceError::Transport(ref msg) if msg.contains("502"));
}

#[tokio::test]
async fn missing_key_is_reported_without_calling_upstream() {
    let (base, mock) = spawn_mock().await;
    let source = TornSource::new(config(&base, &[], &[100])).unwrap();

    let err = source.fetch_roster().await.unwrap_err();
    assert_matches!(err, SourceError::Api { code: 1, .. });
    assert_eq!(mock.hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn no_factions_yields_empty_roster() {
    let (base, mock) = spawn_mock().await;
    let source = TornSource::new(config(&base, &["k1"], &[])).unwrap();

    assert!(source.fetch_roster().await.unwrap().is_empty());
    assert_eq!(mock.hits.load(Ordering::SeqCst), 0);
}
