//! Domain model definitions.

pub mod identity;
pub mod map;
pub mod notification;
pub mod place;
pub mod visit;

pub use identity::{AccountStatus, UserIdentity, UserProfile, UserRole};
pub use map::{
    CreateSharedMapRequest, JoinMapRequest, ListMapsResponse, MapRecord, MapSummary, MemberInfo,
    VisibilityTier,
};
pub use notification::{Notification, NotificationKind};
pub use place::{CandidatePlace, GeoPoint, Place};
pub use visit::{Grade, Visit, VisitDraft};
