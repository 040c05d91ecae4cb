//! Weekly check-in integration tests.

mod common;

use axum::http::StatusCode;
use common::{noon, TestHarness};
use serde_json::json;

/// A Thursday check-in whose first instance opens on 2024-03-07.
async fn create_checkin(harness: &TestHarness, distributions: serde_json::Value) {
    harness
        .admin_put("/v1/admin/checkins/1")
        .json(&json!({
            "name": "Check-in semanal",
            "day_of_week": 4,
            "starts_on": "2024-03-03",
            "questions": [
                {"id": 11, "position": 1, "prompt": "Como foi sua semana?"},
                {"id": 12, "position": 2, "prompt": "Nota de 0 a 10", "kind": "scale"}
            ],
            "distributions": distributions
        }))
        .await
        .assert_status_ok();
}

fn answers() -> serde_json::Value {
    json!({
        "user_id": 42,
        "responses": [
            {"question_id": 11, "response_text": "Boa"},
            {"question_id": 12, "response_value": 8}
        ]
    })
}

#[tokio::test]
async fn weekly_boundary() {
    // Wednesday before the first Thursday.
    let harness = TestHarness::at(noon(2024, 3, 6));
    create_checkin(&harness, json!([])).await;

    let response = harness.get("/v1/users/42/checkins/available").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert!(body["available_checkin"].is_null());

    harness
        .post("/v1/checkins/1/submit")
        .json(&answers())
        .await
        .assert_status(StatusCode::CONFLICT);

    // The following Tuesday the instance is still open.
    harness.set_now(noon(2024, 3, 12));
    let response = harness.get("/v1/users/42/checkins/available").await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["available_checkin"]["id"], 1);
    assert_eq!(body["available_checkin"]["week_date"], "2024-03-03");
    assert_eq!(body["available_checkin"]["questions"][1]["kind"], "scale");
}

#[tokio::test]
async fn submission_awards_once_and_hides_the_checkin() {
    let harness = TestHarness::at(noon(2024, 3, 7));
    create_checkin(&harness, json!([])).await;

    let response = harness.post("/v1/checkins/1/submit").json(&answers()).await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["points_awarded"], 10);
    assert_eq!(body["fresh_award"], true);
    assert_eq!(body["week_date"], "2024-03-03");

    // A retried submission is a success with no points.
    let response = harness.post("/v1/checkins/1/submit").json(&answers()).await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["points_awarded"], 0);
    assert_eq!(body["fresh_award"], false);
    assert_eq!(body["new_total_points"], 10);

    let response = harness.get("/v1/users/42/checkins/available").await;
    let body: serde_json::Value = response.json();
    assert!(body["available_checkin"].is_null());

    let response = harness.get("/v1/checkins/1/status/42").await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["state"], "completed");
}

#[tokio::test]
async fn empty_or_malformed_submissions_are_bad_requests() {
    let harness = TestHarness::at(noon(2024, 3, 7));
    create_checkin(&harness, json!([])).await;

    harness
        .post("/v1/checkins/1/submit")
        .json(&json!({"user_id": 42, "responses": []}))
        .await
        .assert_status_bad_request();

    harness
        .post("/v1/checkins/1/submit")
        .json(&json!({"user_id": 42, "responses": [{"question_id": 11}]}))
        .await
        .assert_status_bad_request();

    // Scale questions take a value between 0 and 10.
    for answer in [
        json!({"question_id": 12, "response_text": "banana"}),
        json!({"question_id": 12, "response_value": -5000}),
        json!({"question_id": 11, "response_value": 3}),
    ] {
        harness
            .post("/v1/checkins/1/submit")
            .json(&json!({"user_id": 42, "responses": [answer]}))
            .await
            .assert_status_bad_request();
    }
    let response = harness.get("/v1/users/42/points").await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["total_points"], 0);

    harness
        .post("/v1/checkins/9/submit")
        .json(&answers())
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn allow_list_limits_visibility() {
    let harness = TestHarness::at(noon(2024, 3, 7));
    create_checkin(
        &harness,
        json!([
            {"target_type": "user", "target_id": 7},
            {"target_type": "group", "target_id": -30}
        ]),
    )
    .await;
    harness
        .admin_put("/v1/admin/users/8/memberships")
        .json(&json!({"memberships": [{"kind": "challenge_group", "group_id": 30}]}))
        .await
        .assert_status_ok();

    for (user, visible) in [(7, true), (8, true), (42, false)] {
        let response = harness
            .get(&format!("/v1/users/{user}/checkins/available"))
            .await;
        let body: serde_json::Value = response.json();
        assert_eq!(!body["available_checkin"].is_null(), visible, "user {user}");
    }

    harness
        .post("/v1/checkins/1/submit")
        .json(&answers())
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn autosave_round_trip() {
    let harness = TestHarness::at(noon(2024, 3, 8));
    create_checkin(&harness, json!([])).await;

    let response = harness
        .put("/v1/checkins/1/progress/42")
        .json(&json!({"responses": [{"question_id": 11, "response_text": "Rascunho"}]}))
        .await;
    response.assert_status_ok();

    let response = harness.get("/v1/checkins/1/progress/42").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["week_date"], "2024-03-03");
    assert_eq!(body["responses"][0]["response_text"], "Rascunho");

    // Autosave never awards.
    let response = harness.get("/v1/users/42/points").await;
    let balance: serde_json::Value = response.json();
    assert_eq!(balance["total_points"], 0);

    // Next week's instance starts blank.
    harness.set_now(noon(2024, 3, 14));
    let response = harness.get("/v1/checkins/1/progress/42").await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["week_date"], "2024-03-10");
    assert!(body["responses"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn admin_endpoints_require_admin_key() {
    let harness = TestHarness::new();

    harness
        .put("/v1/admin/checkins/1")
        .json(&json!({"name": "x", "day_of_week": 4}))
        .await
        .assert_status_unauthorized();

    harness
        .admin_put("/v1/admin/checkins/1")
        .json(&json!({"name": "x", "day_of_week": 9}))
        .await
        .assert_status_bad_request();

    let response = harness.admin_get("/v1/admin/checkins/1").await;
    response.assert_status_not_found();
}
