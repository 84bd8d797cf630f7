//! Place listing, search and visit-filter routes.

use std::collections::HashSet;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use domain::models::{Grade, Place};
use domain::services::membership::resolve_access;
use domain::services::search::{
    filter_places, flatten_visits, search_places, FlatVisit, SearchGroup, SearchScope, VisitFilter,
};

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::CurrentUser;

/// A place with its derived rating fields.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceView {
    #[serde(flatten)]
    pub place: Place,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_grade: Option<Grade>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_score: Option<f64>,
    pub visit_years: Vec<i32>,
}

impl From<Place> for PlaceView {
    fn from(place: Place) -> Self {
        Self {
            average_grade: place.average_grade(),
            average_score: place.average_score(),
            visit_years: place.visit_years(),
            place,
        }
    }
}

/// List all places on a map.
///
/// GET /api/v1/maps/:map_id/places
pub async fn list_places(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(map_id): Path<Uuid>,
) -> Result<Json<Vec<PlaceView>>, ApiError> {
    let mut places = state
        .ledger
        .load_places(&user.identity, user.profile_ref(), map_id)
        .await?;
    places.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(Json(places.into_iter().map(PlaceView::from).collect()))
}

/// Visit filter query parameters. Grades and years are comma-separated.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterQuery {
    pub grades: Option<String>,
    pub years: Option<String>,
}

fn parse_filter(query: &FilterQuery) -> Result<VisitFilter, ApiError> {
    let grades = query
        .grades
        .as_deref()
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    Grade::from_str(s)
                        .ok_or_else(|| ApiError::Validation(format!("Unknown grade {s}")))
                })
                .collect::<Result<HashSet<Grade>, ApiError>>()
        })
        .transpose()?;

    let years = query
        .years
        .as_deref()
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<i32>()
                        .map_err(|_| ApiError::Validation(format!("Invalid year {s}")))
                })
                .collect::<Result<HashSet<i32>, ApiError>>()
        })
        .transpose()?;

    Ok(VisitFilter { grades, years })
}

/// Filtered view of a map: places with matching visits, plus the matching
/// visits flattened out for list rendering.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterResponse {
    pub places: Vec<PlaceView>,
    pub visits: Vec<FlatVisit>,
}

/// Filter a map's visits by grade and year.
///
/// GET /api/v1/maps/:map_id/places/filter?grades=S,A&years=2024
pub async fn filter_visits(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(map_id): Path<Uuid>,
    Query(query): Query<FilterQuery>,
) -> Result<Json<FilterResponse>, ApiError> {
    let filter = parse_filter(&query)?;
    let places = state
        .ledger
        .load_places(&user.identity, user.profile_ref(), map_id)
        .await?;

    let visits = flatten_visits(&places, &filter);
    let places = filter_places(&places, &filter)
        .into_iter()
        .map(PlaceView::from)
        .collect();
    Ok(Json(FilterResponse { places, visits }))
}

/// Search query parameters. `sources` is an optional comma-separated list
/// of map ids restricting which maps are searched.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    pub sources: Option<String>,
}

fn parse_sources(raw: Option<&str>) -> Result<Option<HashSet<Uuid>>, ApiError> {
    raw.map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<Uuid>()
                    .map_err(|_| ApiError::Validation(format!("Invalid map id {s}")))
            })
            .collect::<Result<HashSet<Uuid>, ApiError>>()
    })
    .transpose()
}

/// Search places by name or address across the caller's readable maps,
/// optionally restricted to the given source maps.
///
/// GET /api/v1/search?q=coffee&sources=<map-id>,<map-id>
pub async fn search(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<SearchGroup>>, ApiError> {
    let sources = parse_sources(query.sources.as_deref())?;
    let maps = state.directory.load_all().await?;

    let mut scopes = Vec::new();
    for map in maps {
        if let Some(sources) = &sources {
            if !sources.contains(&map.id) {
                continue;
            }
        }
        let access = resolve_access(&user.identity, user.profile_ref(), &map);
        if !access.permissions.can_read {
            continue;
        }
        let places = state
            .ledger
            .load_places(&user.identity, user.profile_ref(), map.id)
            .await?;
        scopes.push(SearchScope {
            map_id: map.id,
            map_name: map.name,
            places,
        });
    }

    Ok(Json(search_places(&query.q, &scopes)))
}
