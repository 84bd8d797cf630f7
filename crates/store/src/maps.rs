//! Map directory: map records, share codes, membership caps.
//!
//! Map records live in the `maps` collection of the document store. The
//! directory owns every membership mutation so the caps and the share-code
//! uniqueness rule are enforced in one place.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use domain::models::map::{generate_share_code, timestamp_share_code};
use domain::models::{MapRecord, MemberInfo, UserIdentity, UserProfile, VisibilityTier};
use domain::services::membership::resolve_access;

use crate::error::StoreError;
use crate::metrics::OpTimer;
use crate::transport::{collections, DocumentStore};

/// Membership policy knobs. All limits are configuration, not structure.
#[derive(Debug, Clone, Copy)]
pub struct DirectoryPolicy {
    /// Shared maps a user may own.
    pub max_owned_shared: usize,
    /// Shared maps a user may join without owning.
    pub max_joined_shared: usize,
    /// Members per shared map, owner included.
    pub max_members_per_map: usize,
    /// Share-code generation attempts before the timestamp fallback.
    pub share_code_attempts: usize,
}

impl Default for DirectoryPolicy {
    fn default() -> Self {
        Self {
            max_owned_shared: 3,
            max_joined_shared: 3,
            max_members_per_map: 10,
            share_code_attempts: 5,
        }
    }
}

/// Gate applied to every write path before membership resolution: the
/// identity provider's profile must say `approved`, and the profile (when
/// present) must belong to the acting identity.
pub(crate) fn ensure_approved_writer(
    user: &UserIdentity,
    profile: Option<&UserProfile>,
) -> Result<(), StoreError> {
    match profile {
        Some(p) if p.uid == user.uid && p.is_approved() => Ok(()),
        Some(_) => Err(StoreError::denied("account is not approved for writes")),
        None => Err(StoreError::denied("no profile; writes require approval")),
    }
}

/// Directory of map records.
#[derive(Clone)]
pub struct MapDirectory {
    store: Arc<dyn DocumentStore>,
    policy: DirectoryPolicy,
}

impl MapDirectory {
    pub fn new(store: Arc<dyn DocumentStore>, policy: DirectoryPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> DirectoryPolicy {
        self.policy
    }

    fn decode(doc_id: &str, data: serde_json::Value) -> Result<MapRecord, StoreError> {
        serde_json::from_value(data).map_err(|e| StoreError::invalid_document(doc_id, e))
    }

    async fn write_map(&self, map: &MapRecord) -> Result<(), StoreError> {
        let data =
            serde_json::to_value(map).map_err(|e| StoreError::invalid_document("map", e))?;
        self.store
            .write(collections::MAPS, &map.id.to_string(), data)
            .await?;
        Ok(())
    }

    /// Loads every map record. Corrupt documents are skipped with a warning
    /// rather than poisoning the whole listing.
    pub async fn load_all(&self) -> Result<Vec<MapRecord>, StoreError> {
        let timer = OpTimer::new("load_all_maps");
        let docs = self.store.list(collections::MAPS).await?;
        timer.record();

        let mut maps = Vec::with_capacity(docs.len());
        for (doc_id, data) in docs {
            match Self::decode(&doc_id, data) {
                Ok(map) => maps.push(map),
                Err(e) => warn!(doc_id = %doc_id, error = %e, "Skipping corrupt map document"),
            }
        }
        Ok(maps)
    }

    pub async fn get_map(&self, map_id: Uuid) -> Result<MapRecord, StoreError> {
        let doc = self
            .store
            .get(collections::MAPS, &map_id.to_string())
            .await?
            .ok_or_else(|| StoreError::not_found(format!("map {map_id}")))?;
        Self::decode(&map_id.to_string(), doc)
    }

    /// Provisions the user's default map if it does not exist yet.
    ///
    /// Returns the map and whether it was created by this call, so the
    /// caller can deliver the welcome notification exactly once.
    pub async fn ensure_default_map(
        &self,
        user: &UserIdentity,
    ) -> Result<(MapRecord, bool), StoreError> {
        let maps = self.load_all().await?;
        if let Some(existing) = maps
            .into_iter()
            .find(|m| m.owner_id == user.uid && m.is_default)
        {
            return Ok((existing, false));
        }

        let map = MapRecord::default_for(user.uid, user.name_or_default());
        self.write_map(&map).await?;
        info!(map_id = %map.id, owner = %user.uid, "Provisioned default map");
        Ok((map, true))
    }

    /// Picks a share code not used by any existing shared map.
    fn unique_share_code(&self, existing: &[MapRecord]) -> Result<String, StoreError> {
        let in_use =
            |code: &str| existing.iter().any(|m| m.share_code.as_deref() == Some(code));

        for _ in 0..self.policy.share_code_attempts {
            let code = generate_share_code();
            if !in_use(&code) {
                return Ok(code);
            }
        }

        let fallback = timestamp_share_code(Utc::now());
        if in_use(&fallback) {
            return Err(StoreError::CapacityExceeded(
                "could not allocate a unique share code".to_string(),
            ));
        }
        warn!(code = %fallback, "Share-code generation fell back to timestamp code");
        Ok(fallback)
    }

    /// Creates a shared map owned (and membered) by `user`.
    pub async fn create_shared_map(
        &self,
        user: &UserIdentity,
        profile: Option<&UserProfile>,
        name: &str,
    ) -> Result<MapRecord, StoreError> {
        ensure_approved_writer(user, profile)?;
        if user.is_anonymous {
            return Err(StoreError::denied("guests cannot create shared maps"));
        }

        let maps = self.load_all().await?;
        let owned_shared = maps
            .iter()
            .filter(|m| m.owner_id == user.uid && m.visibility == VisibilityTier::Shared)
            .count();
        if owned_shared >= self.policy.max_owned_shared {
            return Err(StoreError::CapacityExceeded(format!(
                "at most {} owned shared maps",
                self.policy.max_owned_shared
            )));
        }

        let share_code = self.unique_share_code(&maps)?;
        let now = Utc::now();
        let map = MapRecord {
            id: Uuid::new_v4(),
            owner_id: user.uid,
            name: name.to_string(),
            visibility: VisibilityTier::Shared,
            is_default: false,
            share_code: Some(share_code),
            members: [user.uid].into_iter().collect(),
            member_info: vec![MemberInfo {
                uid: user.uid,
                display_name: user.name_or_default().to_string(),
                photo_ref: user.photo_ref.clone(),
                joined_at: now,
            }],
            created_at: now,
        };
        self.write_map(&map).await?;
        info!(map_id = %map.id, owner = %user.uid, "Created shared map");
        Ok(map)
    }

    /// Joins a shared map by share code. Joining a map the user already
    /// belongs to is a benign no-op, reported via the returned flag so the
    /// caller fans out only on real joins.
    pub async fn join_map(
        &self,
        user: &UserIdentity,
        profile: Option<&UserProfile>,
        share_code: &str,
    ) -> Result<(MapRecord, bool), StoreError> {
        ensure_approved_writer(user, profile)?;
        if user.is_anonymous {
            return Err(StoreError::denied("guests cannot join shared maps"));
        }

        let maps = self.load_all().await?;
        let mut map = maps
            .iter()
            .find(|m| {
                m.visibility == VisibilityTier::Shared
                    && m.share_code.as_deref() == Some(share_code)
            })
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("no shared map with code {share_code}")))?;

        if map.is_member(user.uid) {
            return Ok((map, false));
        }

        let joined = maps
            .iter()
            .filter(|m| {
                m.visibility == VisibilityTier::Shared
                    && m.owner_id != user.uid
                    && m.is_member(user.uid)
            })
            .count();
        if joined >= self.policy.max_joined_shared {
            return Err(StoreError::CapacityExceeded(format!(
                "at most {} joined shared maps",
                self.policy.max_joined_shared
            )));
        }
        if map.member_count() >= self.policy.max_members_per_map {
            return Err(StoreError::CapacityExceeded(format!(
                "map is full ({} members)",
                self.policy.max_members_per_map
            )));
        }

        map.add_member(MemberInfo {
            uid: user.uid,
            display_name: user.name_or_default().to_string(),
            photo_ref: user.photo_ref.clone(),
            joined_at: Utc::now(),
        });
        self.write_map(&map).await?;
        info!(map_id = %map.id, uid = %user.uid, "Member joined map");
        Ok((map, true))
    }

    /// Leaves a shared map. The owner cannot leave their own map; leaving a
    /// map the user is not in is a benign no-op.
    pub async fn leave_map(
        &self,
        user: &UserIdentity,
        profile: Option<&UserProfile>,
        map_id: Uuid,
    ) -> Result<MapRecord, StoreError> {
        ensure_approved_writer(user, profile)?;

        let mut map = self.get_map(map_id).await?;
        if map.owner_id == user.uid {
            return Err(StoreError::denied(
                "the owner cannot leave their own map; delete it instead",
            ));
        }
        if map.remove_member(user.uid) {
            self.write_map(&map).await?;
            info!(map_id = %map.id, uid = %user.uid, "Member left map");
        }
        Ok(map)
    }

    /// Removes a member from a shared map. Owner-only; the owner cannot be
    /// removed.
    pub async fn remove_member(
        &self,
        actor: &UserIdentity,
        profile: Option<&UserProfile>,
        map_id: Uuid,
        member_uid: Uuid,
    ) -> Result<MapRecord, StoreError> {
        ensure_approved_writer(actor, profile)?;

        let mut map = self.get_map(map_id).await?;
        let access = resolve_access(actor, profile, &map);
        if !access.permissions.can_manage_members {
            return Err(StoreError::denied("only the owner manages members"));
        }
        if member_uid == map.owner_id {
            return Err(StoreError::denied("the owner cannot be removed"));
        }
        if !map.remove_member(member_uid) {
            return Err(StoreError::not_found(format!(
                "member {member_uid} is not in map {map_id}"
            )));
        }
        self.write_map(&map).await?;
        info!(map_id = %map.id, removed = %member_uid, "Member removed from map");
        Ok(map)
    }

    /// Deletes a map and cascades its place documents. Owner-only.
    pub async fn delete_map(
        &self,
        actor: &UserIdentity,
        profile: Option<&UserProfile>,
        map_id: Uuid,
    ) -> Result<(), StoreError> {
        ensure_approved_writer(actor, profile)?;

        let map = self.get_map(map_id).await?;
        if map.owner_id != actor.uid {
            return Err(StoreError::denied("only the owner may delete a map"));
        }

        let places = collections::places(map_id);
        for (doc_id, _) in self.store.list(&places).await? {
            self.store.delete(&places, &doc_id).await?;
        }
        self.store
            .delete(collections::MAPS, &map_id.to_string())
            .await?;
        info!(map_id = %map_id, "Deleted map and cascaded place documents");
        Ok(())
    }
}
