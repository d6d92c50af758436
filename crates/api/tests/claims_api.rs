mod common;

use axum::http::StatusCode;
use common::{body_json, build_test_app, claim_body, delete, get, member_out, post_json, T0};

fn roster() -> Vec<warboard_core::target::MemberRecord> {
    (1..=5).map(member_out).collect()
}

// ---------------------------------------------------------------------------
// Claim
// ---------------------------------------------------------------------------

#[tokio::test]
async fn claim_returns_the_new_claim() {
    let app = build_test_app(roster());

    let response = post_json(app.router.clone(), "/api/claim", claim_body(1, 77)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;

    assert_eq!(json["success"], true);
    assert_eq!(json["message"], "Target claimed successfully");
    assert_eq!(json["claim"]["target_id"], 1);
    assert_eq!(json["claim"]["target_name"], "Target1");
    assert_eq!(json["claim"]["claimed_by_id"], 77);
    assert_eq!(json["claim"]["claimed_by"], "User77");
    assert_eq!(json["claim"]["claimed_at"], T0);
    assert_eq!(json["claim"]["expires_at"], T0 + 120);
}

#[tokio::test]
async fn reclaiming_own_target_keeps_original_expiry() {
    let app = build_test_app(roster());
    post_json(app.router.clone(), "/api/claim", claim_body(1, 77)).await;

    app.time.advance_secs(30);
    let response = post_json(app.router.clone(), "/api/claim", claim_body(1, 77)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;

    assert_eq!(json["success"], true);
    assert_eq!(json["message"], "Target already claimed by you");
    assert_eq!(json["claim"]["expires_at"], T0 + 120);
}

#[tokio::test]
async fn claim_held_by_another_is_conflict() {
    let app = build_test_app(roster());
    post_json(app.router.clone(), "/api/claim", claim_body(1, 77)).await;

    app.time.advance_secs(20);
    let response = post_json(app.router.clone(), "/api/claim", claim_body(1, 88)).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;

    assert_eq!(json["success"], false);
    assert_eq!(json["code"], "ALREADY_CLAIMED");
    assert_eq!(json["message"], "Already claimed by User77 (100s remaining)");
}

#[tokio::test]
async fn claim_limit_is_enforced_per_claimer() {
    let app = build_test_app(roster());
    for target in 1..=3 {
        let response = post_json(app.router.clone(), "/api/claim", claim_body(target, 77)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = post_json(app.router.clone(), "/api/claim", claim_body(4, 77)).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["code"], "CLAIM_LIMIT_EXCEEDED");
    assert_eq!(json["message"], "Maximum 3 claims reached");

    // Another claimer is unaffected.
    let response = post_json(app.router.clone(), "/api/claim", claim_body(4, 88)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn expired_claim_can_be_taken_by_someone_else() {
    let app = build_test_app(roster());
    post_json(app.router.clone(), "/api/claim", claim_body(1, 77)).await;

    app.time.set_secs(T0 + 120);
    let response = post_json(app.router.clone(), "/api/claim", claim_body(1, 88)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["claim"]["claimed_by_id"], 88);
    assert_eq!(json["claim"]["expires_at"], T0 + 240);
}

#[tokio::test]
async fn claim_on_untracked_target_is_not_found() {
    let app = build_test_app(roster());

    let response = post_json(app.router.clone(), "/api/claim", claim_body(999, 77)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["code"], "UNKNOWN_TARGET");
}

#[tokio::test]
async fn invalid_claim_requests_are_rejected() {
    let app = build_test_app(roster());

    let blank_name = serde_json::json!({"target_id": 1, "claimer_id": 77, "claimer_name": "   "});
    let response = post_json(app.router.clone(), "/api/claim", blank_name).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");

    let bad_id = serde_json::json!({"target_id": 0, "claimer_id": 77, "claimer_name": "Ann"});
    let response = post_json(app.router.clone(), "/api/claim", bad_id).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Validation happens before any upstream call.
    assert_eq!(app.source.fetches(), 0);
}

// ---------------------------------------------------------------------------
// Release / resolve
// ---------------------------------------------------------------------------

#[tokio::test]
async fn holder_can_release_claim() {
    let app = build_test_app(roster());
    post_json(app.router.clone(), "/api/claim", claim_body(1, 77)).await;

    let response = delete(app.router.clone(), "/api/claim/1?claimer_id=77").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["message"], "Claim released");

    let json = body_json(get(app.router.clone(), "/api/claims").await).await;
    assert_eq!(json["count"], 0);
}

#[tokio::test]
async fn releasing_someone_elses_claim_is_forbidden() {
    let app = build_test_app(roster());
    post_json(app.router.clone(), "/api/claim", claim_body(1, 77)).await;

    let response = delete(app.router.clone(), "/api/claim/1?claimer_id=88").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["code"], "NOT_CLAIMED_BY_YOU");
    assert_eq!(json["message"], "Claim belongs to User77");

    let json = body_json(get(app.router.clone(), "/api/claims").await).await;
    assert_eq!(json["count"], 1);
}

#[tokio::test]
async fn releasing_unclaimed_target_is_forbidden() {
    let app = build_test_app(roster());

    let response = delete(app.router.clone(), "/api/claim/1?claimer_id=77").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["message"], "No active claim on this target");
}

#[tokio::test]
async fn resolve_releases_the_claim() {
    let app = build_test_app(roster());
    post_json(app.router.clone(), "/api/claim", claim_body(1, 77)).await;

    let response = post_json(
        app.router.clone(),
        "/api/claim/1/resolve?claimer_id=77",
        serde_json::json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["message"], "Attack resolved, claim released");

    // The slot is free again for the same claimer.
    let response = post_json(app.router.clone(), "/api/claim", claim_body(1, 77)).await;
    assert_eq!(body_json(response).await["message"], "Target claimed successfully");
}

#[tokio::test]
async fn admin_force_release_ignores_holder() {
    let app = build_test_app(roster());
    post_json(app.router.clone(), "/api/claim", claim_body(1, 77)).await;

    let response = delete(app.router.clone(), "/api/admin/claim/1").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["message"], "Claim force released");

    let response = delete(app.router.clone(), "/api/admin/claim/1").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn release_requires_claimer_id() {
    let app = build_test_app(roster());

    let response = delete(app.router.clone(), "/api/claim/1").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn malformed_claim_body_is_bad_request() {
    let app = build_test_app(roster());

    let response = post_json(app.router.clone(), "/api/claim", serde_json::json!({"target_id": 1})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "BAD_REQUEST");
    assert!(json["error"].as_str().unwrap().contains("claimer_id"));
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn claims_listing_filters_by_claimer() {
    let app = build_test_app(roster());
    post_json(app.router.clone(), "/api/claim", claim_body(1, 77)).await;
    app.time.advance_secs(1);
    post_json(app.router.clone(), "/api/claim", claim_body(2, 77)).await;
    post_json(app.router.clone(), "/api/claim", claim_body(3, 88)).await;

    let json = body_json(get(app.router.clone(), "/api/claims").await).await;
    assert_eq!(json["count"], 3);
    assert_eq!(json["claims"][0]["target_id"], 1);

    let json = body_json(get(app.router.clone(), "/api/claims?claimer_id=77").await).await;
    assert_eq!(json["count"], 2);
    let targets: Vec<i64> = json["claims"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["target_id"].as_i64().unwrap())
        .collect();
    assert_eq!(targets, vec![1, 2]);
}

#[tokio::test]
async fn claims_listing_retires_claims_on_vanished_targets() {
    let app = build_test_app(roster());
    post_json(app.router.clone(), "/api/claim", claim_body(1, 77)).await;
    post_json(app.router.clone(), "/api/claim", claim_body(2, 77)).await;
    post_json(app.router.clone(), "/api/claim", claim_body(3, 77)).await;

    app.source.set_roster((2..=5).map(member_out).collect());
    app.time.advance_secs(3);
    // A claim attempt refreshes the cache; the claimer is still at the limit.
    let response = post_json(app.router.clone(), "/api/claim", claim_body(4, 77)).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let fetches = app.source.fetches();

    let json = body_json(get(app.router.clone(), "/api/claims?claimer_id=77").await).await;
    assert_eq!(json["count"], 2);
    assert_eq!(json["claims"][0]["target_id"], 2);
    assert_eq!(app.source.fetches(), fetches);

    // The freed slot is usable right away.
    let response = post_json(app.router.clone(), "/api/claim", claim_body(4, 77)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn claims_listing_omits_expired_claims() {
    let app = build_test_app(roster());
    post_json(app.router.clone(), "/api/claim", claim_body(1, 77)).await;
    app.time.advance_secs(60);
    post_json(app.router.clone(), "/api/claim", claim_body(2, 77)).await;

    app.time.set_secs(T0 + 150);
    let json = body_json(get(app.router.clone(), "/api/claims").await).await;
    assert_eq!(json["count"], 1);
    assert_eq!(json["claims"][0]["target_id"], 2);
}
