//! Map directory routes: creation, membership, selection and sync status.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use domain::models::{
    CreateSharedMapRequest, JoinMapRequest, ListMapsResponse, MapSummary,
};
use domain::services::fanout::{plan_join_approved, plan_roster_fanout, plan_welcome, RosterEvent};
use domain::services::membership::resolve_access;
use store::{MapClass, SubscriptionState};

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::CurrentUser;

/// Create a new shared map.
///
/// POST /api/v1/maps
pub async fn create_shared_map(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CreateSharedMapRequest>,
) -> Result<(StatusCode, Json<MapSummary>), ApiError> {
    request.validate()?;

    let map = state
        .directory
        .create_shared_map(&user.identity, user.profile_ref(), &request.name)
        .await?;

    Ok((StatusCode::CREATED, Json(MapSummary::from(&map))))
}

/// Ensure the caller's default map exists, delivering the welcome
/// notification when this call created it.
///
/// POST /api/v1/maps/default
pub async fn ensure_default_map(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<MapSummary>, ApiError> {
    let (map, created) = state.directory.ensure_default_map(&user.identity).await?;
    if created {
        state
            .fanout
            .deliver(vec![plan_welcome(&user.identity, &map)])
            .await;
    }
    Ok(Json(MapSummary::from(&map)))
}

/// List the maps visible to the caller, classified by relationship.
///
/// GET /api/v1/maps
pub async fn list_maps(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<ListMapsResponse>, ApiError> {
    let is_admin = user.profile_ref().is_some_and(|p| p.is_admin());
    let mut maps = state.directory.load_all().await?;
    maps.sort_by_key(|m| m.created_at);

    let mut owned = Vec::new();
    let mut owned_shared = Vec::new();
    let mut joined_shared = Vec::new();
    let mut all = Vec::new();

    for map in &maps {
        match MapClass::classify(map, user.identity.uid, is_admin) {
            Some(MapClass::Owned) => owned.push(MapSummary::from(map)),
            Some(MapClass::OwnedShared) => owned_shared.push(MapSummary::from(map)),
            Some(MapClass::JoinedShared) => joined_shared.push(MapSummary::from(map)),
            Some(MapClass::AdminAll) => all.push(MapSummary::from(map)),
            None => {}
        }
    }

    Ok(Json(ListMapsResponse {
        owned,
        owned_shared,
        joined_shared,
        all: is_admin.then_some(all),
    }))
}

/// Join a shared map by share code.
///
/// POST /api/v1/maps/join
pub async fn join_map(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<JoinMapRequest>,
) -> Result<Json<MapSummary>, ApiError> {
    request.validate()?;

    let (map, joined) = state
        .directory
        .join_map(&user.identity, user.profile_ref(), &request.share_code)
        .await?;

    if joined {
        let mut planned = plan_roster_fanout(
            &map,
            &user.identity,
            RosterEvent::Joined,
            user.identity.uid,
            user.identity.name_or_default(),
        );
        planned.push(plan_join_approved(&user.identity, &map));
        state.fanout.deliver(planned).await;
    }

    Ok(Json(MapSummary::from(&map)))
}

/// Leave a shared map.
///
/// POST /api/v1/maps/:map_id/leave
pub async fn leave_map(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(map_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let map = state
        .directory
        .leave_map(&user.identity, user.profile_ref(), map_id)
        .await?;

    let planned = plan_roster_fanout(
        &map,
        &user.identity,
        RosterEvent::Left,
        user.identity.uid,
        user.identity.name_or_default(),
    );
    state.fanout.deliver(planned).await;

    Ok(StatusCode::NO_CONTENT)
}

/// Remove a member from a shared map. Owner-only.
///
/// DELETE /api/v1/maps/:map_id/members/:member_uid
pub async fn remove_member(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((map_id, member_uid)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    // Resolve the member's display name before the roster loses it.
    let before = state.directory.get_map(map_id).await?;
    let member_name = before
        .member_info
        .iter()
        .find(|m| m.uid == member_uid)
        .map(|m| m.display_name.clone())
        .unwrap_or_else(|| "A member".to_string());

    let map = state
        .directory
        .remove_member(&user.identity, user.profile_ref(), map_id, member_uid)
        .await?;

    let planned = plan_roster_fanout(
        &map,
        &user.identity,
        RosterEvent::Removed,
        member_uid,
        &member_name,
    );
    state.fanout.deliver(planned).await;

    Ok(StatusCode::NO_CONTENT)
}

/// Delete a map and all its places. Owner-only.
///
/// DELETE /api/v1/maps/:map_id
pub async fn delete_map(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(map_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .directory
        .delete_map(&user.identity, user.profile_ref(), map_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Subscription status for the caller's view of one map.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusResponse {
    pub map_id: Uuid,
    pub state: SubscriptionState,
    pub place_count: usize,
}

/// Select a map as the caller's active map, starting its place sync.
///
/// POST /api/v1/maps/:map_id/activate
pub async fn activate_map(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(map_id): Path<Uuid>,
) -> Result<Json<SyncStatusResponse>, ApiError> {
    let map = state.directory.get_map(map_id).await?;
    let access = resolve_access(&user.identity, user.profile_ref(), &map);
    if !access.permissions.can_read {
        return Err(ApiError::Forbidden("no read access to this map".into()));
    }

    let roster = state
        .sessions
        .roster_for(&user.identity, user.profile_ref())
        .await;
    let engine = roster.set_active_map(map_id).await;

    info!(uid = %user.identity.uid, map_id = %map_id, "Activated map");
    Ok(Json(SyncStatusResponse {
        map_id,
        state: engine.state(),
        place_count: engine.places().await.len(),
    }))
}

/// Report the sync state of the caller's active map.
///
/// GET /api/v1/maps/:map_id/sync
pub async fn sync_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(map_id): Path<Uuid>,
) -> Result<Json<SyncStatusResponse>, ApiError> {
    let roster = state
        .sessions
        .roster_for(&user.identity, user.profile_ref())
        .await;

    match roster.active_engine().await {
        Some(engine) if engine.map_id() == map_id => Ok(Json(SyncStatusResponse {
            map_id,
            state: engine.state(),
            place_count: engine.places().await.len(),
        })),
        _ => Ok(Json(SyncStatusResponse {
            map_id,
            state: SubscriptionState::Unsubscribed,
            place_count: 0,
        })),
    }
}

/// End the caller's session, tearing down all live subscriptions.
///
/// POST /api/v1/session/end
pub async fn end_session(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<StatusCode, ApiError> {
    state.sessions.end_session(user.identity.uid).await;
    Ok(StatusCode::NO_CONTENT)
}
