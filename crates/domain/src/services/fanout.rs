//! Notification fan-out planning.
//!
//! Planning is pure: given a map, an actor and an event, produce the set of
//! addressed notifications. Delivery (writing them to the store) lives in
//! the api layer, where failures are logged and swallowed because the data
//! mutation they follow has already committed.

use crate::models::{MapRecord, Notification, NotificationKind, UserIdentity, VisibilityTier};

/// Ledger mutation kinds that fan out to other members.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerEvent {
    PostAdded,
    PostDeleted,
}

impl LedgerEvent {
    fn kind(self) -> NotificationKind {
        match self {
            LedgerEvent::PostAdded => NotificationKind::PostAdded,
            LedgerEvent::PostDeleted => NotificationKind::PostDeleted,
        }
    }

    fn verb(self) -> &'static str {
        match self {
            LedgerEvent::PostAdded => "added a visit to",
            LedgerEvent::PostDeleted => "removed a visit from",
        }
    }
}

/// Plans fan-out for a place/visit mutation.
///
/// Only shared maps with more than one member fan out, and the acting user
/// is never a recipient of their own mutation.
pub fn plan_ledger_fanout(
    map: &MapRecord,
    actor: &UserIdentity,
    event: LedgerEvent,
    place_name: &str,
) -> Vec<Notification> {
    if map.visibility != VisibilityTier::Shared || map.member_count() <= 1 {
        return Vec::new();
    }

    let actor_name = actor.name_or_default();
    let message = format!("{actor_name} {} {place_name} in {}", event.verb(), map.name);

    map.members
        .iter()
        .filter(|uid| **uid != actor.uid)
        .map(|uid| {
            Notification::addressed_to(*uid, event.kind(), message.clone())
                .about_map(map.id, &map.name)
                .by_actor(actor.uid, actor_name)
        })
        .collect()
}

/// Roster change kinds that fan out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RosterEvent {
    Joined,
    Left,
    /// Removal by the owner; `affected` is the removed member.
    Removed,
}

/// Plans fan-out for a membership change on a shared map.
///
/// Joins and leaves notify the remaining members. A removal additionally
/// notifies the removed member themselves, since they will no longer see
/// the map that would otherwise have told them.
pub fn plan_roster_fanout(
    map: &MapRecord,
    actor: &UserIdentity,
    event: RosterEvent,
    affected_uid: uuid::Uuid,
    affected_name: &str,
) -> Vec<Notification> {
    if map.visibility != VisibilityTier::Shared {
        return Vec::new();
    }

    let (kind, message) = match event {
        RosterEvent::Joined => (
            NotificationKind::MemberJoined,
            format!("{affected_name} joined {}", map.name),
        ),
        RosterEvent::Left => (
            NotificationKind::MemberLeft,
            format!("{affected_name} left {}", map.name),
        ),
        RosterEvent::Removed => (
            NotificationKind::MemberRemoved,
            format!("{affected_name} was removed from {}", map.name),
        ),
    };

    let mut notifications: Vec<Notification> = map
        .members
        .iter()
        .filter(|uid| **uid != actor.uid && **uid != affected_uid)
        .map(|uid| {
            Notification::addressed_to(*uid, kind, message.clone())
                .about_map(map.id, &map.name)
                .by_actor(actor.uid, actor.name_or_default())
        })
        .collect();

    if event == RosterEvent::Removed && affected_uid != actor.uid {
        notifications.push(
            Notification::addressed_to(
                affected_uid,
                NotificationKind::MemberRemoved,
                format!("You were removed from {}", map.name),
            )
            .about_map(map.id, &map.name)
            .by_actor(actor.uid, actor.name_or_default()),
        );
    }

    notifications
}

/// The welcome notification delivered when a user's default map is first
/// provisioned.
pub fn plan_welcome(user: &UserIdentity, map: &MapRecord) -> Notification {
    Notification::addressed_to(
        user.uid,
        NotificationKind::Welcome,
        "Welcome to Mapbook! Your map is ready.".to_string(),
    )
    .about_map(map.id, &map.name)
}

/// The confirmation delivered to a user whose join via share code succeeded.
pub fn plan_join_approved(user: &UserIdentity, map: &MapRecord) -> Notification {
    Notification::addressed_to(
        user.uid,
        NotificationKind::JoinApproved,
        format!("You joined {}", map.name),
    )
    .about_map(map.id, &map.name)
}
