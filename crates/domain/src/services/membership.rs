//! Membership resolution service.
//!
//! Resolves a user's relationship to a map into an access tier and a
//! permission set. The resolver is pure and synchronous so the same code
//! path gates both UI affordances and server-side mutation checks.
//!
//! Priority order:
//! 1. global admin -> admin override (full read everywhere)
//! 2. map owner -> owner
//! 3. roster member -> member
//! 4. public map -> viewer (read-only)
//! 5. otherwise -> no access, fail closed
//!
//! A guest (anonymous) identity is denied write regardless of tier.

use serde::Serialize;
use uuid::Uuid;

use crate::models::{MapRecord, UserIdentity, UserProfile, VisibilityTier};

/// Access classification derived from a user's relationship to a map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessTier {
    Owner,
    Member,
    Viewer,
    AdminOverride,
}

/// Concrete permission set for one user on one map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Permissions {
    pub can_read: bool,
    pub can_write: bool,
    pub can_manage_members: bool,
}

/// Resolution result. `tier == None` means no access at all.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Access {
    pub tier: Option<AccessTier>,
    pub permissions: Permissions,
}

impl Access {
    fn denied() -> Self {
        Self {
            tier: None,
            permissions: Permissions::default(),
        }
    }
}

/// Resolve the access tier and permissions for `user` on `map`.
///
/// `profile` is the identity provider's moderation record; a missing profile
/// is treated as a plain, non-admin user. Admins see every map but write
/// only where ordinary membership would let them, so an admin is never a
/// silent extra author on someone else's map.
pub fn resolve_access(
    user: &UserIdentity,
    profile: Option<&UserProfile>,
    map: &MapRecord,
) -> Access {
    let is_admin = profile.is_some_and(UserProfile::is_admin);

    // Membership-based tier, ignoring the admin role.
    let base_tier = if map.owner_id == user.uid {
        Some(AccessTier::Owner)
    } else if map.is_member(user.uid) {
        Some(AccessTier::Member)
    } else if map.visibility == VisibilityTier::Public {
        Some(AccessTier::Viewer)
    } else {
        None
    };

    let mut permissions = match base_tier {
        Some(AccessTier::Owner) => Permissions {
            can_read: true,
            can_write: true,
            can_manage_members: true,
        },
        Some(AccessTier::Member) => Permissions {
            can_read: true,
            can_write: true,
            can_manage_members: false,
        },
        Some(AccessTier::Viewer) => Permissions {
            can_read: true,
            can_write: false,
            can_manage_members: false,
        },
        _ => Permissions::default(),
    };

    // Guests never write, whatever the tier said.
    if user.is_anonymous {
        permissions.can_write = false;
        permissions.can_manage_members = false;
    }

    if is_admin {
        permissions.can_read = true;
        return Access {
            tier: Some(AccessTier::AdminOverride),
            permissions,
        };
    }

    match base_tier {
        Some(tier) => Access {
            tier: Some(tier),
            permissions,
        },
        None => Access::denied(),
    }
}

/// Per-visit modification check (§ edit/delete matrix).
///
/// The author may always touch their own visit; a non-guest user may also
/// touch a guest-authored visit. Nobody else may.
pub fn can_modify_visit(actor: &UserIdentity, author_uid: Uuid, author_is_guest: bool) -> bool {
    if actor.uid == author_uid {
        return true;
    }
    !actor.is_anonymous && author_is_guest
}
