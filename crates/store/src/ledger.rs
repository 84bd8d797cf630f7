//! Place ledger: visit writes against a map's place collection.
//!
//! Every write resolves the candidate place against the map's existing
//! places first, so independently-geocoded duplicates collapse into one
//! pin instead of forking the visit history.

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use domain::models::{CandidatePlace, Place, UserIdentity, UserProfile, Visit, VisitDraft};
use domain::services::geo_merge::{resolve_candidate, MergeConfig, MergeOutcome};
use domain::services::membership::{can_modify_visit, resolve_access};

use crate::error::StoreError;
use crate::maps::{ensure_approved_writer, MapDirectory};
use crate::metrics::{record_place_merged, record_visit_recorded, OpTimer};
use crate::transport::{collections, DocumentStore};

/// Result of recording a visit: the place document as written, the visit
/// as materialized, and whether the candidate was merged into an existing
/// place rather than creating a new one.
#[derive(Debug, Clone)]
pub struct RecordedVisit {
    pub place: Place,
    pub visit: Visit,
    pub merged: bool,
}

/// Result of removing a visit.
#[derive(Debug, Clone, Copy)]
pub struct RemoveOutcome {
    /// The visit was present and removed by this call.
    pub removed: bool,
    /// The place lost its last visit and was deleted with it.
    pub place_deleted: bool,
}

/// Visit ledger over one document store.
#[derive(Clone)]
pub struct LedgerStore {
    store: Arc<dyn DocumentStore>,
    directory: MapDirectory,
    merge: MergeConfig,
}

impl LedgerStore {
    pub fn new(store: Arc<dyn DocumentStore>, directory: MapDirectory, merge: MergeConfig) -> Self {
        Self {
            store,
            directory,
            merge,
        }
    }

    fn decode(doc_id: &str, data: serde_json::Value) -> Result<Place, StoreError> {
        serde_json::from_value(data).map_err(|e| StoreError::invalid_document(doc_id, e))
    }

    async fn write_place(&self, map_id: Uuid, place: &Place) -> Result<(), StoreError> {
        let data =
            serde_json::to_value(place).map_err(|e| StoreError::invalid_document(&place.id, e))?;
        self.store
            .write(&collections::places(map_id), &place.id, data)
            .await?;
        Ok(())
    }

    /// Loads every place on a map, read-gated by membership.
    pub async fn load_places(
        &self,
        user: &UserIdentity,
        profile: Option<&UserProfile>,
        map_id: Uuid,
    ) -> Result<Vec<Place>, StoreError> {
        let map = self.directory.get_map(map_id).await?;
        let access = resolve_access(user, profile, &map);
        if !access.permissions.can_read {
            return Err(StoreError::denied("no read access to this map"));
        }

        let timer = OpTimer::new("load_places");
        let docs = self.store.list(&collections::places(map_id)).await?;
        timer.record();

        let mut places = Vec::with_capacity(docs.len());
        for (doc_id, data) in docs {
            places.push(Self::decode(&doc_id, data)?);
        }
        Ok(places)
    }

    async fn writable_map_places(
        &self,
        actor: &UserIdentity,
        profile: Option<&UserProfile>,
        map_id: Uuid,
    ) -> Result<Vec<Place>, StoreError> {
        ensure_approved_writer(actor, profile)?;
        let map = self.directory.get_map(map_id).await?;
        let access = resolve_access(actor, profile, &map);
        if !access.permissions.can_write {
            return Err(StoreError::denied("no write access to this map"));
        }

        let docs = self.store.list(&collections::places(map_id)).await?;
        let mut places = Vec::with_capacity(docs.len());
        for (doc_id, data) in docs {
            places.push(Self::decode(&doc_id, data)?);
        }
        Ok(places)
    }

    /// Records a visit against a candidate place, merging into an existing
    /// place when the candidate matches by id or proximity.
    pub async fn record_visit(
        &self,
        actor: &UserIdentity,
        profile: Option<&UserProfile>,
        map_id: Uuid,
        candidate: CandidatePlace,
        draft: VisitDraft,
    ) -> Result<RecordedVisit, StoreError> {
        let places = self.writable_map_places(actor, profile, map_id).await?;

        let outcome = resolve_candidate(&candidate.id, candidate.location, &places, &self.merge);
        let visit = draft.into_visit(actor);

        let (mut place, merged) = match outcome.target_id() {
            Some(target) => {
                let existing = places
                    .into_iter()
                    .find(|p| p.id == target)
                    .ok_or_else(|| StoreError::not_found(format!("place {target}")))?;
                let merged = matches!(outcome, MergeOutcome::Nearby(_));
                if merged {
                    debug!(map_id = %map_id, candidate = %candidate.id, into = %existing.id,
                        "Merging candidate into nearby place");
                    record_place_merged();
                }
                (existing, merged)
            }
            None => (candidate.into_place(), false),
        };

        place.visits.push(visit.clone());
        self.write_place(map_id, &place).await?;
        record_visit_recorded();
        info!(map_id = %map_id, place_id = %place.id, visit_id = %visit.id, "Recorded visit");

        Ok(RecordedVisit {
            place,
            visit,
            merged,
        })
    }

    /// Replaces a visit wholesale, preserving its id and authorship. The
    /// change is permitted to the author, and to any non-guest member when
    /// the visit was guest-authored. Concurrent replacements resolve to
    /// whichever write lands last.
    pub async fn replace_visit(
        &self,
        actor: &UserIdentity,
        profile: Option<&UserProfile>,
        map_id: Uuid,
        place_id: &str,
        visit_id: Uuid,
        draft: VisitDraft,
    ) -> Result<(Place, Visit), StoreError> {
        let places = self.writable_map_places(actor, profile, map_id).await?;
        let mut place = places
            .into_iter()
            .find(|p| p.id == place_id)
            .ok_or_else(|| StoreError::not_found(format!("place {place_id}")))?;

        let slot = place
            .visits
            .iter_mut()
            .find(|v| v.id == visit_id)
            .ok_or_else(|| StoreError::not_found(format!("visit {visit_id}")))?;
        if !can_modify_visit(actor, slot.created_by, slot.created_by_guest) {
            return Err(StoreError::denied("not allowed to edit this visit"));
        }

        let replacement = Visit {
            id: slot.id,
            date: draft.date,
            photo_ref: draft.photo_ref,
            photos: draft.photos,
            grade: draft.grade,
            comment: draft.comment,
            created_by: slot.created_by,
            creator_name: slot.creator_name.clone(),
            creator_photo_ref: slot.creator_photo_ref.clone(),
            created_by_guest: slot.created_by_guest,
        };
        *slot = replacement.clone();

        self.write_place(map_id, &place).await?;
        info!(map_id = %map_id, place_id = %place.id, visit_id = %visit_id, "Replaced visit");
        Ok((place, replacement))
    }

    /// Removes a visit by id. Removing a visit that is already gone is a
    /// benign no-op. Deletes the place document when its last visit goes.
    pub async fn remove_visit(
        &self,
        actor: &UserIdentity,
        profile: Option<&UserProfile>,
        map_id: Uuid,
        place_id: &str,
        visit_id: Uuid,
    ) -> Result<RemoveOutcome, StoreError> {
        let places = self.writable_map_places(actor, profile, map_id).await?;
        let mut place = places
            .into_iter()
            .find(|p| p.id == place_id)
            .ok_or_else(|| StoreError::not_found(format!("place {place_id}")))?;

        let Some(target) = place.visit(visit_id) else {
            debug!(map_id = %map_id, place_id = %place_id, visit_id = %visit_id,
                "Visit already removed");
            return Ok(RemoveOutcome {
                removed: false,
                place_deleted: false,
            });
        };
        if !can_modify_visit(actor, target.created_by, target.created_by_guest) {
            return Err(StoreError::denied("not allowed to remove this visit"));
        }

        place.visits.retain(|v| v.id != visit_id);

        if place.visits.is_empty() {
            self.store
                .delete(&collections::places(map_id), &place.id)
                .await?;
            info!(map_id = %map_id, place_id = %place.id, "Removed last visit; place deleted");
            return Ok(RemoveOutcome {
                removed: true,
                place_deleted: true,
            });
        }

        self.write_place(map_id, &place).await?;
        info!(map_id = %map_id, place_id = %place.id, visit_id = %visit_id, "Removed visit");
        Ok(RemoveOutcome {
            removed: true,
            place_deleted: false,
        })
    }
}
