//! Visit recording routes. Writes flow through the ledger store, which
//! applies the geo-merge and permission rules; this layer validates input
//! and fans notifications out afterwards.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use domain::models::{CandidatePlace, Visit, VisitDraft};
use domain::services::fanout::{plan_ledger_fanout, LedgerEvent};

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::CurrentUser;
use crate::routes::places::PlaceView;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecordVisitRequest {
    #[validate(nested)]
    pub place: CandidatePlace,
    #[validate(nested)]
    pub visit: VisitDraft,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordVisitResponse {
    pub place: PlaceView,
    pub visit: Visit,
    /// True when the candidate folded into an existing nearby place.
    pub merged: bool,
}

/// Record a visit on a map, merging the place into a nearby existing one
/// when within the merge radius.
///
/// POST /api/v1/maps/:map_id/visits
pub async fn record_visit(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(map_id): Path<Uuid>,
    Json(payload): Json<RecordVisitRequest>,
) -> Result<(StatusCode, Json<RecordVisitResponse>), ApiError> {
    payload.validate()?;

    let recorded = state
        .ledger
        .record_visit(
            &user.identity,
            user.profile_ref(),
            map_id,
            payload.place,
            payload.visit,
        )
        .await?;

    info!(
        map_id = %map_id,
        place_id = %recorded.place.id,
        merged = recorded.merged,
        "Visit recorded"
    );

    if let Ok(map) = state.directory.get_map(map_id).await {
        let notifications = plan_ledger_fanout(
            &map,
            &user.identity,
            LedgerEvent::PostAdded,
            &recorded.place.name,
        );
        state.fanout.deliver(notifications).await;
    }

    Ok((
        StatusCode::CREATED,
        Json(RecordVisitResponse {
            merged: recorded.merged,
            visit: recorded.visit,
            place: PlaceView::from(recorded.place),
        }),
    ))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceVisitResponse {
    pub place: PlaceView,
    pub visit: Visit,
}

/// Replace the content of an existing visit. Authorship fields are kept.
///
/// PUT /api/v1/maps/:map_id/places/:place_id/visits/:visit_id
pub async fn replace_visit(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((map_id, place_id, visit_id)): Path<(Uuid, String, Uuid)>,
    Json(draft): Json<VisitDraft>,
) -> Result<Json<ReplaceVisitResponse>, ApiError> {
    draft.validate()?;

    let (place, visit) = state
        .ledger
        .replace_visit(
            &user.identity,
            user.profile_ref(),
            map_id,
            &place_id,
            visit_id,
            draft,
        )
        .await?;

    info!(map_id = %map_id, place_id = %place_id, visit_id = %visit_id, "Visit replaced");

    Ok(Json(ReplaceVisitResponse {
        place: PlaceView::from(place),
        visit,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveVisitResponse {
    pub removed: bool,
    pub place_deleted: bool,
}

/// Remove a visit. Deleting the last visit deletes the place with it, and
/// removing a visit that is already gone succeeds without effect.
///
/// DELETE /api/v1/maps/:map_id/places/:place_id/visits/:visit_id
pub async fn remove_visit(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((map_id, place_id, visit_id)): Path<(Uuid, String, Uuid)>,
) -> Result<Json<RemoveVisitResponse>, ApiError> {
    // Capture the name before the place can disappear with its last visit.
    let place_name = state
        .ledger
        .load_places(&user.identity, user.profile_ref(), map_id)
        .await?
        .into_iter()
        .find(|p| p.id == place_id)
        .map(|p| p.name);

    let outcome = state
        .ledger
        .remove_visit(&user.identity, user.profile_ref(), map_id, &place_id, visit_id)
        .await?;

    info!(
        map_id = %map_id,
        place_id = %place_id,
        visit_id = %visit_id,
        removed = outcome.removed,
        place_deleted = outcome.place_deleted,
        "Visit removal handled"
    );

    if outcome.removed {
        if let (Some(name), Ok(map)) = (place_name, state.directory.get_map(map_id).await) {
            let notifications =
                plan_ledger_fanout(&map, &user.identity, LedgerEvent::PostDeleted, &name);
            state.fanout.deliver(notifications).await;
        }
    }

    Ok(Json(RemoveVisitResponse {
        removed: outcome.removed,
        place_deleted: outcome.place_deleted,
    }))
}
