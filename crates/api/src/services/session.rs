//! Per-user session tracking.
//!
//! Each signed-in user gets at most one live [`MapRoster`], which in turn
//! owns at most one active place sync engine. Sessions are created lazily
//! on first use and torn down explicitly on sign-out.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use domain::models::{UserIdentity, UserProfile};
use domain::services::geo_merge::MergeConfig;
use store::{DocumentStore, MapRoster};

pub struct SessionManager {
    store: Arc<dyn DocumentStore>,
    merge: MergeConfig,
    rosters: Mutex<HashMap<Uuid, Arc<MapRoster>>>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn DocumentStore>, merge: MergeConfig) -> Self {
        Self {
            store,
            merge,
            rosters: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the user's live roster, creating it on first use.
    pub async fn roster_for(
        &self,
        user: &UserIdentity,
        profile: Option<&UserProfile>,
    ) -> Arc<MapRoster> {
        let mut rosters = self.rosters.lock().await;
        if let Some(roster) = rosters.get(&user.uid) {
            return roster.clone();
        }
        info!(uid = %user.uid, "Starting session roster");
        let roster = MapRoster::start(self.store.clone(), user, profile, self.merge);
        rosters.insert(user.uid, roster.clone());
        roster
    }

    /// Ends a user's session, tearing down their roster and any active
    /// place subscription. Ending an absent session is a no-op.
    pub async fn end_session(&self, uid: Uuid) {
        let roster = self.rosters.lock().await.remove(&uid);
        if let Some(roster) = roster {
            info!(uid = %uid, "Ending session roster");
            roster.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::MemoryStore;

    fn user(uid: Uuid) -> UserIdentity {
        UserIdentity {
            uid,
            is_anonymous: false,
            display_name: Some("Ana".to_string()),
            email: None,
            photo_ref: None,
        }
    }

    #[tokio::test]
    async fn test_roster_is_shared_per_user() {
        let sessions =
            SessionManager::new(Arc::new(MemoryStore::new()), MergeConfig::default());
        let u = user(Uuid::new_v4());

        let first = sessions.roster_for(&u, None).await;
        let second = sessions.roster_for(&u, None).await;
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_end_session_is_benign_when_absent() {
        let sessions =
            SessionManager::new(Arc::new(MemoryStore::new()), MergeConfig::default());
        sessions.end_session(Uuid::new_v4()).await;
    }

    #[tokio::test]
    async fn test_end_session_tears_down_roster() {
        let sessions =
            SessionManager::new(Arc::new(MemoryStore::new()), MergeConfig::default());
        let u = user(Uuid::new_v4());

        let roster = sessions.roster_for(&u, None).await;
        let engine = roster.set_active_map(Uuid::new_v4()).await;
        sessions.end_session(u.uid).await;

        assert_eq!(
            engine.state(),
            store::SubscriptionState::Unsubscribed
        );

        // A new call builds a fresh roster.
        let fresh = sessions.roster_for(&u, None).await;
        assert!(!Arc::ptr_eq(&roster, &fresh));
    }
}
