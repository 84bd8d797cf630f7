//! Common test utilities for integration tests.
//!
//! Tests run the full router over the in-memory document store, with bearer
//! tokens resolved by a static identity provider.

// Allow dead code in this module - these are helper utilities that may not be used
// by all integration tests but are intentionally available for future use.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use fake::faker::address::en::StreetName;
use fake::faker::internet::en::SafeEmail;
use fake::Fake;
use uuid::Uuid;

use domain::models::{AccountStatus, UserIdentity, UserProfile, UserRole};
use mapbook_api::{app::create_app, config::Config, services::StaticIdentityProvider};
use store::MemoryStore;

/// Test configuration with fan-out and merge defaults.
pub fn test_config() -> Config {
    Config::load_for_test(&[]).expect("Failed to build test configuration")
}

/// A running test application plus the handles needed to seed it.
pub struct TestApp {
    pub app: Router,
    pub store: Arc<MemoryStore>,
    pub identity: Arc<StaticIdentityProvider>,
}

/// Create a test application over a fresh in-memory store.
pub fn create_test_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let identity = Arc::new(StaticIdentityProvider::new());
    let app = create_app(test_config(), store.clone(), identity.clone());
    TestApp {
        app,
        store,
        identity,
    }
}

impl TestApp {
    /// Register an approved user and return their uid. The bearer token is
    /// accepted by every authenticated route.
    pub fn register_user(&self, token: &str, display_name: &str) -> Uuid {
        let uid = Uuid::new_v4();
        self.identity.register(
            token,
            test_identity(uid, display_name),
            Some(UserProfile {
                uid,
                status: AccountStatus::Approved,
                role: UserRole::User,
            }),
        );
        uid
    }

    /// Register a signed-in user whose profile is still pending approval.
    pub fn register_pending_user(&self, token: &str, display_name: &str) -> Uuid {
        let uid = Uuid::new_v4();
        self.identity.register(
            token,
            test_identity(uid, display_name),
            Some(UserProfile {
                uid,
                status: AccountStatus::Pending,
                role: UserRole::User,
            }),
        );
        uid
    }

    /// Register an anonymous guest session (no profile).
    pub fn register_guest(&self, token: &str) -> Uuid {
        let uid = Uuid::new_v4();
        self.identity.register(
            token,
            UserIdentity {
                uid,
                is_anonymous: true,
                display_name: None,
                email: None,
                photo_ref: None,
            },
            None,
        );
        uid
    }

    /// Register an approved administrator.
    pub fn register_admin(&self, token: &str, display_name: &str) -> Uuid {
        let uid = Uuid::new_v4();
        self.identity.register(
            token,
            test_identity(uid, display_name),
            Some(UserProfile {
                uid,
                status: AccountStatus::Approved,
                role: UserRole::Admin,
            }),
        );
        uid
    }
}

fn test_identity(uid: Uuid, display_name: &str) -> UserIdentity {
    UserIdentity {
        uid,
        is_anonymous: false,
        display_name: Some(display_name.to_string()),
        email: Some(SafeEmail().fake()),
        photo_ref: None,
    }
}

/// Build a JSON request with authentication.
pub fn json_request_with_auth(
    method: axum::http::Method,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> axum::http::Request<axum::body::Body> {
    use axum::{
        body::Body,
        http::{header, Request},
    };

    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

/// Build a GET request with authentication.
pub fn get_request_with_auth(uri: &str, token: &str) -> axum::http::Request<axum::body::Body> {
    use axum::{
        body::Body,
        http::{header, Method, Request},
    };

    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

/// Build a DELETE request with authentication.
pub fn delete_request_with_auth(uri: &str, token: &str) -> axum::http::Request<axum::body::Body> {
    use axum::{
        body::Body,
        http::{header, Method, Request},
    };

    Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

/// Helper to parse JSON response body.
pub async fn parse_response_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null)
}

/// Ensure a default map for the token's user and return the map JSON.
pub async fn ensure_default_map(app: &Router, token: &str) -> serde_json::Value {
    use axum::http::Method;
    use tower::ServiceExt;

    let request = json_request_with_auth(
        Method::POST,
        "/api/v1/maps/default",
        serde_json::json!({}),
        token,
    );
    let response = app.clone().oneshot(request).await.unwrap();
    assert!(
        response.status().is_success(),
        "Failed to ensure default map: {}",
        response.status()
    );
    parse_response_body(response).await
}

/// Create a shared map via the API and return its JSON summary.
pub async fn create_shared_map(app: &Router, token: &str, name: &str) -> serde_json::Value {
    use axum::http::{Method, StatusCode};
    use tower::ServiceExt;

    let request = json_request_with_auth(
        Method::POST,
        "/api/v1/maps",
        serde_json::json!({ "name": name }),
        token,
    );
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = parse_response_body(response).await;
    assert_eq!(status, StatusCode::CREATED, "Failed to create map: {}", body);
    body
}

/// Join a shared map by share code and return the response JSON.
pub async fn join_map(app: &Router, token: &str, share_code: &str) -> serde_json::Value {
    use axum::http::Method;
    use tower::ServiceExt;

    let request = json_request_with_auth(
        Method::POST,
        "/api/v1/maps/join",
        serde_json::json!({ "shareCode": share_code }),
        token,
    );
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = parse_response_body(response).await;
    assert!(status.is_success(), "Failed to join map: {}", body);
    body
}

/// Record a visit and return the response JSON.
pub async fn record_visit(
    app: &Router,
    token: &str,
    map_id: &str,
    place: serde_json::Value,
    visit: serde_json::Value,
) -> serde_json::Value {
    use axum::http::{Method, StatusCode};
    use tower::ServiceExt;

    let request = json_request_with_auth(
        Method::POST,
        &format!("/api/v1/maps/{}/visits", map_id),
        serde_json::json!({ "place": place, "visit": visit }),
        token,
    );
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = parse_response_body(response).await;
    assert_eq!(
        status,
        StatusCode::CREATED,
        "Failed to record visit: {}",
        body
    );
    body
}

/// A well-formed visit payload for a given date and grade.
pub fn visit_payload(date: &str, grade: &str) -> serde_json::Value {
    serde_json::json!({
        "date": date,
        "photoRef": format!("photos/{}", Uuid::new_v4()),
        "grade": grade,
        "comment": "Great spot"
    })
}

/// A well-formed place payload at the given coordinates.
pub fn place_payload(id: &str, name: &str, lat: f64, lng: f64) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": name,
        "address": format!("9 {} St", StreetName().fake::<String>()),
        "location": { "lat": lat, "lng": lng }
    })
}
