//! User identity and profile models.
//!
//! Identities are issued by an external identity provider; this layer only
//! consumes them. A profile carries the moderation status and global role
//! that gate every write before map-level membership is even considered.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An authenticated (or anonymous/guest) user identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub uid: Uuid,
    pub is_anonymous: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_ref: Option<String>,
}

impl UserIdentity {
    /// Display name with a fallback for identities that never set one.
    pub fn name_or_default(&self) -> &str {
        self.display_name.as_deref().unwrap_or("Unknown user")
    }
}

/// Account moderation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Pending,
    Approved,
    Rejected,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Pending => "pending",
            AccountStatus::Approved => "approved",
            AccountStatus::Rejected => "rejected",
        }
    }
}

/// Global role attached to a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserRole::User => write!(f, "user"),
            UserRole::Admin => write!(f, "admin"),
        }
    }
}

/// Profile record supplied by the identity provider alongside the identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: Uuid,
    pub status: AccountStatus,
    pub role: UserRole,
}

impl UserProfile {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Writes are only accepted from approved accounts.
    pub fn is_approved(&self) -> bool {
        self.status == AccountStatus::Approved
    }
}
