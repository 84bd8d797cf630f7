//! Identity resolution.
//!
//! Tokens are opaque bearer strings issued by the external identity
//! provider. The provider resolves a token to the signed-in identity plus
//! the server-side profile carrying approval status and role. Anonymous
//! guest sessions resolve to an identity with `is_anonymous` set and no
//! profile.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use thiserror::Error;

use domain::models::{UserIdentity, UserProfile};

/// A resolved bearer token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub identity: UserIdentity,
    /// Absent for guests and for identities not yet provisioned.
    pub profile: Option<UserProfile>,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity service unavailable: {0}")]
    Unavailable(String),
}

/// Resolves bearer tokens to identities.
#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    /// Resolves a token. `None` means the token is unknown or expired.
    async fn resolve(&self, token: &str) -> Result<Option<AuthenticatedUser>, IdentityError>;
}

/// In-process identity provider backed by a token table.
///
/// Serves as the development/test provider; a production deployment plugs
/// in a provider that verifies tokens against the identity service.
#[derive(Default)]
pub struct StaticIdentityProvider {
    tokens: RwLock<HashMap<String, AuthenticatedUser>>,
}

impl StaticIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a token for an identity with its profile.
    pub fn register(
        &self,
        token: impl Into<String>,
        identity: UserIdentity,
        profile: Option<UserProfile>,
    ) {
        if let Ok(mut tokens) = self.tokens.write() {
            tokens.insert(token.into(), AuthenticatedUser { identity, profile });
        }
    }

    pub fn revoke(&self, token: &str) {
        if let Ok(mut tokens) = self.tokens.write() {
            tokens.remove(token);
        }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn resolve(&self, token: &str) -> Result<Option<AuthenticatedUser>, IdentityError> {
        let tokens = self
            .tokens
            .read()
            .map_err(|_| IdentityError::Unavailable("token table poisoned".to_string()))?;
        Ok(tokens.get(token).cloned())
    }
}
