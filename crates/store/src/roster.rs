//! Map roster: a live mirror of the map records relevant to one user,
//! plus ownership of the single active place sync engine.
//!
//! The roster subscribes to the `maps` collection and keeps only the
//! records the user can list. Selecting an active map hands out a
//! [`SyncEngine`] for that map's places; selecting a different map tears
//! the previous engine down first, so at most one place subscription is
//! live per user.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use domain::models::{MapRecord, UserIdentity, UserProfile, VisibilityTier};
use domain::services::geo_merge::MergeConfig;

use crate::sync::{SubscriptionState, SyncEngine};
use crate::transport::{collections, ChangeBatch, DocumentStore, TransportError};

const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// How a map record relates to the roster's user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapClass {
    /// Owned and not shared (the default map included).
    Owned,
    /// Owned and shared with others.
    OwnedShared,
    /// Shared map the user joined but does not own.
    JoinedShared,
    /// Visible only through the admin override.
    AdminAll,
}

impl MapClass {
    /// Classifies a map for a user, or `None` when the user cannot list it.
    pub fn classify(map: &MapRecord, uid: Uuid, is_admin: bool) -> Option<MapClass> {
        if map.owner_id == uid {
            return Some(if map.visibility == VisibilityTier::Shared {
                MapClass::OwnedShared
            } else {
                MapClass::Owned
            });
        }
        if map.visibility == VisibilityTier::Shared && map.is_member(uid) {
            return Some(MapClass::JoinedShared);
        }
        if is_admin {
            return Some(MapClass::AdminAll);
        }
        None
    }
}

/// Point-in-time view of the roster, classified.
#[derive(Debug, Clone, Default)]
pub struct RosterSnapshot {
    pub owned: Vec<MapRecord>,
    pub owned_shared: Vec<MapRecord>,
    pub joined_shared: Vec<MapRecord>,
    /// Populated only for admins.
    pub admin_all: Option<Vec<MapRecord>>,
}

/// Live roster for one user session.
pub struct MapRoster {
    store: Arc<dyn DocumentStore>,
    uid: Uuid,
    is_admin: bool,
    merge: MergeConfig,
    maps: RwLock<HashMap<Uuid, MapRecord>>,
    state_tx: watch::Sender<SubscriptionState>,
    cancel_tx: watch::Sender<bool>,
    active: Mutex<Option<Arc<SyncEngine>>>,
    task: StdMutex<Option<JoinHandle<()>>>,
}

impl MapRoster {
    /// Spawns the roster mirror for one user.
    pub fn start(
        store: Arc<dyn DocumentStore>,
        user: &UserIdentity,
        profile: Option<&UserProfile>,
        merge: MergeConfig,
    ) -> Arc<Self> {
        let (state_tx, _) = watch::channel(SubscriptionState::Unsubscribed);
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let roster = Arc::new(Self {
            store: store.clone(),
            uid: user.uid,
            is_admin: profile.is_some_and(UserProfile::is_admin),
            merge,
            maps: RwLock::new(HashMap::new()),
            state_tx,
            cancel_tx,
            active: Mutex::new(None),
            task: StdMutex::new(None),
        });

        let handle = tokio::spawn(Self::run(roster.clone(), store, cancel_rx));
        if let Ok(mut slot) = roster.task.lock() {
            *slot = Some(handle);
        }
        roster
    }

    pub fn state(&self) -> SubscriptionState {
        *self.state_tx.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<SubscriptionState> {
        self.state_tx.subscribe()
    }

    /// Classified view of the roster's current contents, each class sorted
    /// by creation time.
    pub async fn snapshot(&self) -> RosterSnapshot {
        let guard = self.maps.read().await;
        let mut snapshot = RosterSnapshot::default();
        let mut admin_all = Vec::new();

        for map in guard.values() {
            match MapClass::classify(map, self.uid, self.is_admin) {
                Some(MapClass::Owned) => snapshot.owned.push(map.clone()),
                Some(MapClass::OwnedShared) => snapshot.owned_shared.push(map.clone()),
                Some(MapClass::JoinedShared) => snapshot.joined_shared.push(map.clone()),
                Some(MapClass::AdminAll) => admin_all.push(map.clone()),
                None => {}
            }
        }

        for class in [
            &mut snapshot.owned,
            &mut snapshot.owned_shared,
            &mut snapshot.joined_shared,
        ] {
            class.sort_by_key(|m| m.created_at);
        }
        if self.is_admin {
            admin_all.sort_by_key(|m| m.created_at);
            snapshot.admin_all = Some(admin_all);
        }
        snapshot
    }

    /// Selects the active map and returns its place sync engine.
    ///
    /// Selecting the already-active map returns the existing engine;
    /// switching maps shuts the previous engine down first.
    pub async fn set_active_map(&self, map_id: Uuid) -> Arc<SyncEngine> {
        let mut active = self.active.lock().await;
        if let Some(engine) = active.as_ref() {
            if engine.map_id() == map_id {
                return engine.clone();
            }
            info!(old = %engine.map_id(), new = %map_id, "Switching active map");
            engine.shutdown().await;
        }
        let engine = SyncEngine::start(self.store.clone(), map_id, self.merge);
        *active = Some(engine.clone());
        engine
    }

    /// Returns the active engine without changing the selection.
    pub async fn active_engine(&self) -> Option<Arc<SyncEngine>> {
        self.active.lock().await.clone()
    }

    /// Deselects the active map, tearing down its engine.
    pub async fn clear_active_map(&self) {
        if let Some(engine) = self.active.lock().await.take() {
            engine.shutdown().await;
        }
    }

    /// Stops the roster mirror and the active engine, waiting for both.
    pub async fn shutdown(&self) {
        self.clear_active_map().await;
        let _ = self.cancel_tx.send(true);
        let handle = self.task.lock().ok().and_then(|mut slot| slot.take());
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        let _ = self.state_tx.send(SubscriptionState::Unsubscribed);
    }

    fn set_state(&self, state: SubscriptionState) {
        let _ = self.state_tx.send(state);
    }

    async fn run(
        roster: Arc<Self>,
        store: Arc<dyn DocumentStore>,
        mut cancel: watch::Receiver<bool>,
    ) {
        let mut backoff = INITIAL_BACKOFF;

        'outer: loop {
            if *cancel.borrow_and_update() {
                break;
            }
            roster.set_state(SubscriptionState::Subscribing);

            let stream = tokio::select! {
                s = store.subscribe(collections::MAPS) => s,
                _ = cancel.changed() => break,
            };
            let mut stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(uid = %roster.uid, error = %e, "Roster subscribe failed");
                    roster.set_state(SubscriptionState::Error);
                    tokio::select! {
                        _ = tokio::time::sleep(backoff) => {}
                        _ = cancel.changed() => break,
                    }
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    continue;
                }
            };

            let mut first = true;
            loop {
                let batch = tokio::select! {
                    b = stream.next() => b,
                    _ = cancel.changed() => break 'outer,
                };
                match batch {
                    Ok(batch) => {
                        roster.apply_batch(batch, first).await;
                        if first {
                            roster.set_state(SubscriptionState::Live);
                            backoff = INITIAL_BACKOFF;
                            first = false;
                        }
                    }
                    Err(TransportError::Lagged(n)) => {
                        warn!(uid = %roster.uid, dropped = n,
                            "Roster stream lagged; resubscribing from snapshot");
                        break;
                    }
                    Err(e) => {
                        warn!(uid = %roster.uid, error = %e, "Roster stream failed");
                        roster.set_state(SubscriptionState::Error);
                        tokio::select! {
                            _ = tokio::time::sleep(backoff) => {}
                            _ = cancel.changed() => break 'outer,
                        }
                        backoff = (backoff * 2).min(MAX_BACKOFF);
                        break;
                    }
                }
            }
        }

        roster.set_state(SubscriptionState::Unsubscribed);
    }

    async fn apply_batch(&self, batch: ChangeBatch, snapshot: bool) {
        let mut guard = self.maps.write().await;
        if snapshot {
            guard.clear();
        }
        for change in batch {
            let Some(data) = change.data else {
                if let Ok(map_id) = change.doc_id.parse::<Uuid>() {
                    guard.remove(&map_id);
                }
                continue;
            };
            let map: MapRecord = match serde_json::from_value(data) {
                Ok(map) => map,
                Err(e) => {
                    warn!(doc_id = %change.doc_id, error = %e, "Skipping corrupt map document");
                    continue;
                }
            };
            // Records the user cannot list are not mirrored at all.
            if MapClass::classify(&map, self.uid, self.is_admin).is_some() {
                guard.insert(map.id, map);
            } else {
                guard.remove(&map.id);
            }
        }
    }
}
