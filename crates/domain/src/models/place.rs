//! Place domain model.
//!
//! A place is one document in a map's place collection. Its id is supplied
//! by the geocoding provider that resolved it, so two providers may hand out
//! different ids for the same physical venue; the geo-merge service exists
//! to bridge that.

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::visit::{Grade, Visit};

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GeoPoint {
    #[validate(custom(function = "shared::validation::validate_latitude"))]
    pub lat: f64,
    #[validate(custom(function = "shared::validation::validate_longitude"))]
    pub lng: f64,
}

/// A physical location with its recorded visits.
///
/// A place with an empty visit list is transient garbage: the store deletes
/// it, eventually if not synchronously.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Place {
    /// Provider-supplied place identifier.
    pub id: String,
    pub name: String,
    pub address: String,
    pub location: GeoPoint,
    #[serde(default)]
    pub visits: Vec<Visit>,
}

impl Place {
    /// Mean visit score, if any visits exist.
    pub fn average_score(&self) -> Option<f64> {
        if self.visits.is_empty() {
            return None;
        }
        let sum: u32 = self.visits.iter().map(|v| u32::from(v.grade.score())).sum();
        Some(f64::from(sum) / self.visits.len() as f64)
    }

    /// Mean visit grade, rounded to the nearest grade.
    pub fn average_grade(&self) -> Option<Grade> {
        self.average_score().map(Grade::from_score)
    }

    pub fn visit(&self, visit_id: uuid::Uuid) -> Option<&Visit> {
        self.visits.iter().find(|v| v.id == visit_id)
    }

    /// Distinct years across all visits, ascending.
    pub fn visit_years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self.visits.iter().map(Visit::year).collect();
        years.sort_unstable();
        years.dedup();
        years
    }
}

/// A geocoded place candidate submitted with a new visit, before geo-merge
/// has decided whether it already exists in the target map.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CandidatePlace {
    #[validate(length(min = 1, max = 200, message = "Place id must be 1-200 characters"))]
    pub id: String,

    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,

    #[serde(default)]
    pub address: String,

    #[validate(nested)]
    pub location: GeoPoint,
}

impl CandidatePlace {
    /// Materializes the candidate as a fresh place with no visits yet.
    pub fn into_place(self) -> Place {
        Place {
            id: self.id,
            name: self.name,
            address: self.address,
            location: self.location,
            visits: Vec::new(),
        }
    }
}
