//! Visit domain model.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Rating grade for a visit, best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
    S,
    A,
    B,
    C,
    D,
    E,
}

impl Grade {
    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::S => "S",
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::E => "E",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "S" => Some(Grade::S),
            "A" => Some(Grade::A),
            "B" => Some(Grade::B),
            "C" => Some(Grade::C),
            "D" => Some(Grade::D),
            "E" => Some(Grade::E),
            _ => None,
        }
    }

    /// Numeric score used for averaging (S = 5 .. E = 0).
    pub fn score(&self) -> u8 {
        match self {
            Grade::S => 5,
            Grade::A => 4,
            Grade::B => 3,
            Grade::C => 2,
            Grade::D => 1,
            Grade::E => 0,
        }
    }

    /// Nearest grade for an averaged score.
    pub fn from_score(score: f64) -> Self {
        match score.round().clamp(0.0, 5.0) as u8 {
            5 => Grade::S,
            4 => Grade::A,
            3 => Grade::B,
            2 => Grade::C,
            1 => Grade::D,
            _ => Grade::E,
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One dated, rated, photographed record of a visit to a place.
///
/// Immutable except via full replace by id or removal by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    pub id: Uuid,
    pub date: NaiveDate,
    /// Primary photo reference, already validated and stored upstream.
    pub photo_ref: String,
    /// Additional photo references.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub photos: Vec<String>,
    pub grade: Grade,
    pub comment: String,
    pub created_by: Uuid,
    pub creator_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator_photo_ref: Option<String>,
    /// Whether the author was an anonymous/guest identity at creation time.
    /// Guest-authored visits may be edited or removed by any non-guest member.
    #[serde(default)]
    pub created_by_guest: bool,
}

impl Visit {
    pub fn year(&self) -> i32 {
        self.date.year()
    }
}

fn validate_visit_date(date: &NaiveDate) -> Result<(), validator::ValidationError> {
    shared::validation::validate_visit_year(date.year())
}

/// Caller-supplied visit payload; the server fills in id and authorship.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VisitDraft {
    #[validate(custom(function = "validate_visit_date"))]
    pub date: NaiveDate,

    #[validate(length(min = 1, message = "A primary photo reference is required"))]
    pub photo_ref: String,

    #[serde(default)]
    pub photos: Vec<String>,

    pub grade: Grade,

    #[validate(length(max = 2000, message = "Comment must be at most 2000 characters"))]
    #[serde(default)]
    pub comment: String,
}

impl VisitDraft {
    /// Materializes the draft into a visit authored by the given identity.
    pub fn into_visit(self, author: &crate::models::UserIdentity) -> Visit {
        Visit {
            id: Uuid::new_v4(),
            date: self.date,
            photo_ref: self.photo_ref,
            photos: self.photos,
            grade: self.grade,
            comment: self.comment,
            created_by: author.uid,
            creator_name: author.name_or_default().to_string(),
            creator_photo_ref: author.photo_ref.clone(),
            created_by_guest: author.is_anonymous,
        }
    }
}
