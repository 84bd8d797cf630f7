//! Map domain models.
//!
//! A map is a named, access-controlled collection of places. Every user owns
//! exactly one private default map; shared maps carry a 4-digit share code
//! and a member roster.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Access classification of a map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisibilityTier {
    Private,
    Shared,
    Public,
}

impl VisibilityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisibilityTier::Private => "private",
            VisibilityTier::Shared => "shared",
            VisibilityTier::Public => "public",
        }
    }
}

/// Roster entry for one member of a shared map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberInfo {
    pub uid: Uuid,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_ref: Option<String>,
    pub joined_at: DateTime<Utc>,
}

/// A map record as stored in the `maps` collection.
///
/// Invariants:
/// - exactly one map per user has `is_default = true` with that user as owner
/// - for shared maps the owner is present in `members`, so `members.len()`
///   is the full membership count
/// - `share_code` is set iff `visibility == Shared`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub visibility: VisibilityTier,
    #[serde(default)]
    pub is_default: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_code: Option<String>,
    #[serde(default)]
    pub members: HashSet<Uuid>,
    #[serde(default)]
    pub member_info: Vec<MemberInfo>,
    pub created_at: DateTime<Utc>,
}

impl MapRecord {
    /// Builds the private default map provisioned for a new user.
    pub fn default_for(owner_id: Uuid, owner_name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            name: format!("{owner_name}'s map"),
            visibility: VisibilityTier::Private,
            is_default: true,
            share_code: None,
            members: HashSet::new(),
            member_info: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn is_member(&self, uid: Uuid) -> bool {
        self.members.contains(&uid)
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Adds a member to the roster. Returns false if already present.
    pub fn add_member(&mut self, info: MemberInfo) -> bool {
        if !self.members.insert(info.uid) {
            return false;
        }
        self.member_info.push(info);
        true
    }

    /// Removes a member from the roster. Returns false if absent.
    pub fn remove_member(&mut self, uid: Uuid) -> bool {
        if !self.members.remove(&uid) {
            return false;
        }
        self.member_info.retain(|m| m.uid != uid);
        true
    }
}

/// Generate a random 4-digit share code.
///
/// Uniqueness among shared maps is the caller's responsibility; on repeated
/// collisions callers fall back to [`timestamp_share_code`].
pub fn generate_share_code() -> String {
    use rand::Rng;
    let n: u16 = rand::thread_rng().gen_range(0..10_000);
    format!("{n:04}")
}

/// Deterministic fallback code derived from the current time.
pub fn timestamp_share_code(now: DateTime<Utc>) -> String {
    format!("{:04}", now.timestamp() % 10_000)
}

/// Request to create a new shared map.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSharedMapRequest {
    #[validate(length(min = 1, max = 60, message = "Name must be 1-60 characters"))]
    pub name: String,
}

/// Request to join a shared map by share code.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct JoinMapRequest {
    #[validate(custom(function = "shared::validation::validate_share_code"))]
    pub share_code: String,
}

/// Map summary for listing responses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapSummary {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub visibility: VisibilityTier,
    pub is_default: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_code: Option<String>,
    pub member_count: usize,
    pub created_at: DateTime<Utc>,
}

impl From<&MapRecord> for MapSummary {
    fn from(m: &MapRecord) -> Self {
        Self {
            id: m.id,
            owner_id: m.owner_id,
            name: m.name.clone(),
            visibility: m.visibility,
            is_default: m.is_default,
            share_code: m.share_code.clone(),
            member_count: m.member_count(),
            created_at: m.created_at,
        }
    }
}

/// Maps visible to a user, grouped by relationship.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMapsResponse {
    pub owned: Vec<MapSummary>,
    pub owned_shared: Vec<MapSummary>,
    pub joined_shared: Vec<MapSummary>,
    /// Present only for global admins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all: Option<Vec<MapSummary>>,
}
