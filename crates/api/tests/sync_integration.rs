//! Integration tests for map activation and live sync status.

mod common;

use std::time::Duration;

use axum::http::{Method, StatusCode};
use axum::Router;
use tower::ServiceExt;

use common::*;

/// Polls the sync endpoint until the predicate holds or two seconds pass.
async fn wait_for_sync<F>(app: &Router, token: &str, map_id: &str, predicate: F) -> serde_json::Value
where
    F: Fn(&serde_json::Value) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let request = get_request_with_auth(&format!("/api/v1/maps/{map_id}/sync"), token);
        let response = app.clone().oneshot(request).await.unwrap();
        let body = parse_response_body(response).await;
        if predicate(&body) {
            return body;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("Sync state never converged: {body}");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn test_activate_map_starts_live_sync() {
    let test_app = create_test_app();
    test_app.register_user("ana-token", "Ana");
    let map = ensure_default_map(&test_app.app, "ana-token").await;
    let map_id = map["id"].as_str().unwrap();

    record_visit(
        &test_app.app,
        "ana-token",
        map_id,
        place_payload("p-1", "Cafe Xanadu", 40.0, -73.0),
        visit_payload("2026-08-01", "A"),
    )
    .await;

    let request = json_request_with_auth(
        Method::POST,
        &format!("/api/v1/maps/{map_id}/activate"),
        serde_json::json!({}),
        "ana-token",
    );
    let response = test_app.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = wait_for_sync(&test_app.app, "ana-token", map_id, |b| {
        b["state"] == "live" && b["placeCount"] == 1
    })
    .await;
    assert_eq!(body["mapId"], map_id);
}

#[tokio::test]
async fn test_live_sync_picks_up_new_visits() {
    let test_app = create_test_app();
    test_app.register_user("ana-token", "Ana");
    let map = ensure_default_map(&test_app.app, "ana-token").await;
    let map_id = map["id"].as_str().unwrap();

    let request = json_request_with_auth(
        Method::POST,
        &format!("/api/v1/maps/{map_id}/activate"),
        serde_json::json!({}),
        "ana-token",
    );
    test_app.app.clone().oneshot(request).await.unwrap();
    wait_for_sync(&test_app.app, "ana-token", map_id, |b| b["state"] == "live").await;

    record_visit(
        &test_app.app,
        "ana-token",
        map_id,
        place_payload("p-1", "Cafe Xanadu", 40.0, -73.0),
        visit_payload("2026-08-01", "A"),
    )
    .await;

    wait_for_sync(&test_app.app, "ana-token", map_id, |b| b["placeCount"] == 1).await;
}

#[tokio::test]
async fn test_sync_status_for_inactive_map_is_unsubscribed() {
    let test_app = create_test_app();
    test_app.register_user("ana-token", "Ana");
    let map = ensure_default_map(&test_app.app, "ana-token").await;

    let request = get_request_with_auth(
        &format!("/api/v1/maps/{}/sync", map["id"].as_str().unwrap()),
        "ana-token",
    );
    let response = test_app.app.clone().oneshot(request).await.unwrap();
    let body = parse_response_body(response).await;
    assert_eq!(body["state"], "unsubscribed");
    assert_eq!(body["placeCount"], 0);
}

#[tokio::test]
async fn test_activating_another_map_switches_the_subscription() {
    let test_app = create_test_app();
    test_app.register_user("ana-token", "Ana");
    let first = ensure_default_map(&test_app.app, "ana-token").await;
    let second = create_shared_map(&test_app.app, "ana-token", "Brunch spots").await;
    let first_id = first["id"].as_str().unwrap();
    let second_id = second["id"].as_str().unwrap();

    for map_id in [first_id, second_id] {
        let request = json_request_with_auth(
            Method::POST,
            &format!("/api/v1/maps/{map_id}/activate"),
            serde_json::json!({}),
            "ana-token",
        );
        test_app.app.clone().oneshot(request).await.unwrap();
    }

    wait_for_sync(&test_app.app, "ana-token", second_id, |b| b["state"] == "live").await;

    // The first map no longer reports an active engine.
    let request = get_request_with_auth(&format!("/api/v1/maps/{first_id}/sync"), "ana-token");
    let response = test_app.app.clone().oneshot(request).await.unwrap();
    let body = parse_response_body(response).await;
    assert_eq!(body["state"], "unsubscribed");
}

#[tokio::test]
async fn test_cannot_activate_unreadable_map() {
    let test_app = create_test_app();
    test_app.register_user("ana-token", "Ana");
    test_app.register_user("eve-token", "Eve");
    let map = ensure_default_map(&test_app.app, "ana-token").await;

    let request = json_request_with_auth(
        Method::POST,
        &format!("/api/v1/maps/{}/activate", map["id"].as_str().unwrap()),
        serde_json::json!({}),
        "eve-token",
    );
    let response = test_app.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_end_session_tears_down_sync() {
    let test_app = create_test_app();
    test_app.register_user("ana-token", "Ana");
    let map = ensure_default_map(&test_app.app, "ana-token").await;
    let map_id = map["id"].as_str().unwrap();

    let request = json_request_with_auth(
        Method::POST,
        &format!("/api/v1/maps/{map_id}/activate"),
        serde_json::json!({}),
        "ana-token",
    );
    test_app.app.clone().oneshot(request).await.unwrap();
    wait_for_sync(&test_app.app, "ana-token", map_id, |b| b["state"] == "live").await;

    let request = json_request_with_auth(
        Method::POST,
        "/api/v1/session/end",
        serde_json::json!({}),
        "ana-token",
    );
    let response = test_app.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let request = get_request_with_auth(&format!("/api/v1/maps/{map_id}/sync"), "ana-token");
    let response = test_app.app.clone().oneshot(request).await.unwrap();
    let body = parse_response_body(response).await;
    assert_eq!(body["state"], "unsubscribed");
}
