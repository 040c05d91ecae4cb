//! Points ledger integration tests.

mod common;

use common::{header, value, TestHarness};
use serde_json::json;

async fn award(harness: &TestHarness, context_id: &str, date: &str) -> serde_json::Value {
    let response = harness
        .post("/v1/points/award")
        .json(&json!({
            "user_id": harness.test_user_id,
            "action_key": "ROUTINE_COMPLETE",
            "context_id": context_id,
            "amount": 5,
            "date": date
        }))
        .await;
    response.assert_status_ok();
    response.json()
}

// ============================================================================
// Award
// ============================================================================

#[tokio::test]
async fn award_is_idempotent_per_day() {
    let harness = TestHarness::new();

    let first = award(&harness, "42", "2024-03-01").await;
    assert_eq!(first["points_awarded"], 5);
    assert_eq!(first["new_total_points"], 5);
    assert_eq!(first["already_awarded"], false);

    let repeat = award(&harness, "42", "2024-03-01").await;
    assert_eq!(repeat["points_awarded"], 0);
    assert_eq!(repeat["new_total_points"], 5);
    assert_eq!(repeat["already_awarded"], true);

    let response = harness.get("/v1/users/42/points").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["total_points"], 5);
}

#[tokio::test]
async fn award_defaults_to_today() {
    let harness = TestHarness::new();

    harness
        .post("/v1/points/award")
        .json(&json!({
            "user_id": harness.test_user_id,
            "action_key": "ROUTINE_COMPLETE",
            "context_id": "7",
            "amount": 5
        }))
        .await
        .assert_status_ok();

    // Explicitly dated on the harness day: already awarded.
    let repeat = award(&harness, "7", "2024-03-01").await;
    assert_eq!(repeat["points_awarded"], 0);
}

#[tokio::test]
async fn award_validation_errors_are_bad_requests() {
    let harness = TestHarness::new();

    for body in [
        json!({"user_id": 0, "action_key": "ROUTINE_COMPLETE", "context_id": "1", "amount": 5}),
        json!({"user_id": 1, "action_key": " ", "context_id": "1", "amount": 5}),
        json!({"user_id": 1, "action_key": "ROUTINE_COMPLETE", "context_id": "1", "amount": 0}),
        json!({"user_id": 1, "action_key": "ROUTINE_COMPLETE", "context_id": "1", "amount": 5, "date": "2024-02-30"}),
    ] {
        let response = harness.post("/v1/points/award").json(&body).await;
        response.assert_status_bad_request();
        let error: serde_json::Value = response.json();
        assert_eq!(error["error"]["code"], "bad_request");
    }

    let response = harness.get("/v1/users/1/points").await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["total_points"], 0);
}

#[tokio::test]
async fn award_requires_service_key() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/points/award")
        .json(&json!({"user_id": 1, "action_key": "X", "context_id": "1", "amount": 5}))
        .await;
    response.assert_status_unauthorized();

    let response = harness
        .server
        .post("/v1/points/award")
        .add_header(header("x-api-key"), value("wrong-key"))
        .json(&json!({"user_id": 1, "action_key": "X", "context_id": "1", "amount": 5}))
        .await;
    response.assert_status_unauthorized();
}

// ============================================================================
// Revoke, history, reconcile
// ============================================================================

#[tokio::test]
async fn revoke_is_idempotent() {
    let harness = TestHarness::new();
    award(&harness, "42", "2024-03-01").await;

    let revoke = json!({
        "user_id": harness.test_user_id,
        "action_key": "ROUTINE_COMPLETE",
        "context_id": "42",
        "date": "2024-03-01"
    });

    let response = harness.post("/v1/points/revoke").json(&revoke).await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["points_revoked"], 5);
    assert_eq!(body["new_total_points"], 0);

    let response = harness.post("/v1/points/revoke").json(&revoke).await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["points_revoked"], 0);
}

#[tokio::test]
async fn history_is_newest_first() {
    let harness = TestHarness::new();
    award(&harness, "1", "2024-03-01").await;
    harness.set_now(common::noon(2024, 3, 2));
    award(&harness, "2", "2024-03-02").await;

    let response = harness
        .get("/v1/users/42/points/history")
        .add_query_param("limit", 1)
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let entries = body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["context_id"], "2");
    assert_eq!(body["has_more"], true);
}

#[tokio::test]
async fn reconcile_without_drift() {
    let harness = TestHarness::new();
    award(&harness, "1", "2024-03-01").await;

    let response = harness.post("/v1/users/42/points/reconcile").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["ledger_total"], 5);
    assert_eq!(body["drift"], 0);
}
