//! Authenticated-user extractor.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::user_auth::{bearer_token, AuthExtension};
use domain::models::{UserIdentity, UserProfile};

/// The authenticated caller.
///
/// Handlers take this instead of reading headers; the token was resolved
/// either by the auth middleware or directly by this extractor.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub identity: UserIdentity,
    pub profile: Option<UserProfile>,
}

impl CurrentUser {
    pub fn profile_ref(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }
}

impl From<AuthExtension> for CurrentUser {
    fn from(auth: AuthExtension) -> Self {
        Self {
            identity: auth.identity,
            profile: auth.profile,
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // The middleware may already have resolved the token.
        if let Some(auth) = parts.extensions.get::<AuthExtension>() {
            return Ok(auth.clone().into());
        }

        let header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok());
        let token = bearer_token(header)
            .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;

        match state.identity.resolve(token).await {
            Ok(Some(auth)) => Ok(auth.into()),
            Ok(None) => Err(ApiError::Unauthorized(
                "Unknown or expired token".to_string(),
            )),
            Err(e) => Err(ApiError::ServiceUnavailable(format!(
                "Identity service unavailable: {e}"
            ))),
        }
    }
}
