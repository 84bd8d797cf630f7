//! Search and filter projections over cached place sets.
//!
//! These are pure, synchronous functions: they never await I/O and operate
//! on whatever place set the sync layer currently holds.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Grade, Place, Visit};

/// One map's worth of places offered to a search.
#[derive(Debug, Clone)]
pub struct SearchScope {
    pub map_id: Uuid,
    pub map_name: String,
    pub places: Vec<Place>,
}

/// Matches within one source map.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchGroup {
    pub map_id: Uuid,
    pub map_name: String,
    pub matches: Vec<Place>,
}

/// Case-insensitive substring search over place name and address, grouped
/// by source map. An empty or whitespace-only query matches nothing.
pub fn search_places(query: &str, scopes: &[SearchScope]) -> Vec<SearchGroup> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    scopes
        .iter()
        .filter_map(|scope| {
            let matches: Vec<Place> = scope
                .places
                .iter()
                .filter(|p| {
                    p.name.to_lowercase().contains(&needle)
                        || p.address.to_lowercase().contains(&needle)
                })
                .cloned()
                .collect();
            if matches.is_empty() {
                None
            } else {
                Some(SearchGroup {
                    map_id: scope.map_id,
                    map_name: scope.map_name.clone(),
                    matches,
                })
            }
        })
        .collect()
}

/// Visit-level filter criteria. `None` means "no constraint".
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitFilter {
    pub grades: Option<HashSet<Grade>>,
    pub years: Option<HashSet<i32>>,
}

impl VisitFilter {
    fn matches(&self, visit: &Visit) -> bool {
        if let Some(grades) = &self.grades {
            if !grades.contains(&visit.grade) {
                return false;
            }
        }
        if let Some(years) = &self.years {
            if !years.contains(&visit.year()) {
                return false;
            }
        }
        true
    }
}

/// A visit flattened out of its place for filter results.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatVisit {
    pub place_id: String,
    pub place_name: String,
    pub visit: Visit,
}

/// Flattens all visits across `places` and keeps those matching the filter.
pub fn flatten_visits(places: &[Place], filter: &VisitFilter) -> Vec<FlatVisit> {
    places
        .iter()
        .flat_map(|p| {
            p.visits
                .iter()
                .filter(|v| filter.matches(v))
                .map(|v| FlatVisit {
                    place_id: p.id.clone(),
                    place_name: p.name.clone(),
                    visit: v.clone(),
                })
        })
        .collect()
}

/// Projects `places` down to those with at least one matching visit,
/// retaining only the matching visits in each.
pub fn filter_places(places: &[Place], filter: &VisitFilter) -> Vec<Place> {
    places
        .iter()
        .filter_map(|p| {
            let visits: Vec<Visit> = p
                .visits
                .iter()
                .filter(|v| filter.matches(v))
                .cloned()
                .collect();
            if visits.is_empty() {
                None
            } else {
                let mut kept = p.clone();
                kept.visits = visits;
                Some(kept)
            }
        })
        .collect()
}
