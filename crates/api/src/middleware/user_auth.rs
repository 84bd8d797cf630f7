//! Bearer-token authentication middleware.
//!
//! Validates the Authorization header against the configured identity
//! provider and stores the resolved user in request extensions for
//! downstream handlers.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::app::AppState;
use crate::services::identity::AuthenticatedUser;

/// Extracts the bearer token from an Authorization header value.
pub(crate) fn bearer_token(header: Option<&str>) -> Option<&str> {
    header.and_then(|h| h.strip_prefix("Bearer "))
}

/// Middleware that requires a resolvable bearer token.
///
/// The resolved [`AuthenticatedUser`] is stored in request extensions.
pub async fn require_user_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let header = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok());

    let Some(token) = bearer_token(header) else {
        return unauthorized_response("Missing or invalid Authorization header");
    };

    match state.identity.resolve(token).await {
        Ok(Some(user)) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Ok(None) => unauthorized_response("Unknown or expired token"),
        Err(e) => {
            tracing::error!("Identity provider failure: {}", e);
            service_unavailable_response("Identity service unavailable")
        }
    }
}

fn unauthorized_response(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "error": "unauthorized",
            "message": message,
        })),
    )
        .into_response()
}

fn service_unavailable_response(message: &str) -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({
            "error": "service_unavailable",
            "message": message,
        })),
    )
        .into_response()
}

// Re-exported for the extractor, which shares the extension type.
pub(crate) type AuthExtension = AuthenticatedUser;
