//! Notification domain model.
//!
//! Notifications are created by the fan-out service and owned exclusively by
//! their recipient; only the recipient may mark one read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Notification type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    MemberJoined,
    MemberLeft,
    MemberRemoved,
    JoinApproved,
    PostAdded,
    PostDeleted,
    MapInvite,
    Welcome,
    System,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NotificationKind::MemberJoined => "member_joined",
            NotificationKind::MemberLeft => "member_left",
            NotificationKind::MemberRemoved => "member_removed",
            NotificationKind::JoinApproved => "join_approved",
            NotificationKind::PostAdded => "post_added",
            NotificationKind::PostDeleted => "post_deleted",
            NotificationKind::MapInvite => "map_invite",
            NotificationKind::Welcome => "welcome",
            NotificationKind::System => "system",
        };
        write!(f, "{s}")
    }
}

/// An addressed notification document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub recipient_uid: Uuid,
    pub kind: NotificationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_uid: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_name: Option<String>,
    pub message: String,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Builds an unread notification addressed to one recipient.
    pub fn addressed_to(recipient_uid: Uuid, kind: NotificationKind, message: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient_uid,
            kind,
            map_id: None,
            map_name: None,
            actor_uid: None,
            actor_name: None,
            message,
            read: false,
            created_at: Utc::now(),
        }
    }

    pub fn about_map(mut self, map_id: Uuid, map_name: &str) -> Self {
        self.map_id = Some(map_id);
        self.map_name = Some(map_name.to_string());
        self
    }

    pub fn by_actor(mut self, actor_uid: Uuid, actor_name: &str) -> Self {
        self.actor_uid = Some(actor_uid);
        self.actor_name = Some(actor_name.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_display() {
        assert_eq!(NotificationKind::PostAdded.to_string(), "post_added");
        assert_eq!(NotificationKind::MemberRemoved.to_string(), "member_removed");
        assert_eq!(NotificationKind::Welcome.to_string(), "welcome");
    }

    #[test]
    fn test_kind_serialization_matches_display() {
        for kind in [
            NotificationKind::MemberJoined,
            NotificationKind::MemberLeft,
            NotificationKind::MemberRemoved,
            NotificationKind::JoinApproved,
            NotificationKind::PostAdded,
            NotificationKind::PostDeleted,
            NotificationKind::MapInvite,
            NotificationKind::Welcome,
            NotificationKind::System,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{kind}\""));
        }
    }

    #[test]
    fn test_builder_chain() {
        let recipient = Uuid::new_v4();
        let map_id = Uuid::new_v4();
        let actor = Uuid::new_v4();

        let n = Notification::addressed_to(
            recipient,
            NotificationKind::PostAdded,
            "Ana added a visit".to_string(),
        )
        .about_map(map_id, "Brunch spots")
        .by_actor(actor, "Ana");

        assert_eq!(n.recipient_uid, recipient);
        assert_eq!(n.map_id, Some(map_id));
        assert_eq!(n.actor_name.as_deref(), Some("Ana"));
        assert!(!n.read);
    }
}
