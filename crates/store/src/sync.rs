//! Sync engine: a live in-memory mirror of one map's place collection.
//!
//! The mirror is a read-only projection fed exclusively from the change
//! stream. Incoming upserts run through the same geo-merge rule as writes,
//! so a remote document that duplicates an existing pin folds into it
//! instead of forking the map. Batches may be re-delivered; application is
//! idempotent because documents are replaced by id and visits are deduped
//! by id.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use std::sync::Mutex;

use tokio::sync::{broadcast, watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use domain::models::Place;
use domain::services::geo_merge::{resolve_candidate, MergeConfig, MergeOutcome};

use crate::transport::{collections, ChangeBatch, DocumentStore, TransportError};

const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(30);
const SIGNAL_CAPACITY: usize = 64;

/// Lifecycle of a collection subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionState {
    Unsubscribed,
    Subscribing,
    Live,
    Error,
}

impl std::fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SubscriptionState::Unsubscribed => "unsubscribed",
            SubscriptionState::Subscribing => "subscribing",
            SubscriptionState::Live => "live",
            SubscriptionState::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Mirror events consumers react to. `PlaceRemoved` lets a consumer drop a
/// selection that no longer exists.
#[derive(Debug, Clone)]
pub enum SyncSignal {
    PlacesChanged,
    PlaceRemoved(String),
}

/// Live mirror of one map's places.
pub struct SyncEngine {
    map_id: Uuid,
    merge: MergeConfig,
    places: RwLock<HashMap<String, Place>>,
    state_tx: watch::Sender<SubscriptionState>,
    signal_tx: broadcast::Sender<SyncSignal>,
    cancel_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SyncEngine {
    /// Spawns the mirror task for `map_id` and returns the engine handle.
    pub fn start(
        store: Arc<dyn DocumentStore>,
        map_id: Uuid,
        merge: MergeConfig,
    ) -> Arc<Self> {
        let (state_tx, _) = watch::channel(SubscriptionState::Unsubscribed);
        let (signal_tx, _) = broadcast::channel(SIGNAL_CAPACITY);
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let engine = Arc::new(Self {
            map_id,
            merge,
            places: RwLock::new(HashMap::new()),
            state_tx,
            signal_tx,
            cancel_tx,
            task: Mutex::new(None),
        });

        let handle = tokio::spawn(Self::run(engine.clone(), store, cancel_rx));
        if let Ok(mut slot) = engine.task.lock() {
            *slot = Some(handle);
        }
        engine
    }

    pub fn map_id(&self) -> Uuid {
        self.map_id
    }

    pub fn state(&self) -> SubscriptionState {
        *self.state_tx.borrow()
    }

    /// Watches subscription state transitions.
    pub fn watch_state(&self) -> watch::Receiver<SubscriptionState> {
        self.state_tx.subscribe()
    }

    /// Subscribes to mirror events.
    pub fn subscribe_signals(&self) -> broadcast::Receiver<SyncSignal> {
        self.signal_tx.subscribe()
    }

    /// Current mirror contents, sorted by place name for stable output.
    pub async fn places(&self) -> Vec<Place> {
        let guard = self.places.read().await;
        let mut places: Vec<Place> = guard.values().cloned().collect();
        places.sort_by(|a, b| a.name.cmp(&b.name));
        places
    }

    /// Stops the mirror task and waits for it to exit.
    pub async fn shutdown(&self) {
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

    fn signal(&self, signal: SyncSignal) {
        // Nobody listening is fine.
        let _ = self.signal_tx.send(signal);
    }

    async fn run(
        engine: Arc<Self>,
        store: Arc<dyn DocumentStore>,
        mut cancel: watch::Receiver<bool>,
    ) {
        let collection = collections::places(engine.map_id);
        let mut backoff = INITIAL_BACKOFF;

        'outer: loop {
            if *cancel.borrow_and_update() {
                break;
            }
            engine.set_state(SubscriptionState::Subscribing);

            let stream = tokio::select! {
                s = store.subscribe(&collection) => s,
                _ = cancel.changed() => break,
            };
            let mut stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(map_id = %engine.map_id, error = %e, "Subscribe failed");
                    engine.set_state(SubscriptionState::Error);
                    tokio::select! {
                        _ = tokio::time::sleep(backoff) => {}
                        _ = cancel.changed() => break,
                    }
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    continue;
                }
            };

            // The first batch of every (re)subscription is the snapshot.
            let mut first = true;
            loop {
                let batch = tokio::select! {
                    b = stream.next() => b,
                    _ = cancel.changed() => break 'outer,
                };
                match batch {
                    Ok(batch) => {
                        if first {
                            engine.rebuild(batch).await;
                            engine.set_state(SubscriptionState::Live);
                            backoff = INITIAL_BACKOFF;
                            first = false;
                        } else {
                            engine.apply_batch(batch).await;
                        }
                    }
                    Err(TransportError::Lagged(n)) => {
                        warn!(map_id = %engine.map_id, dropped = n,
                            "Change stream lagged; resubscribing from snapshot");
                        break;
                    }
                    Err(e) => {
                        warn!(map_id = %engine.map_id, error = %e, "Change stream failed");
                        engine.set_state(SubscriptionState::Error);
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

        engine.set_state(SubscriptionState::Unsubscribed);
    }

    /// Replaces the mirror from a snapshot batch, reporting places that
    /// disappeared while the stream was down.
    async fn rebuild(&self, batch: ChangeBatch) {
        let mut fresh: HashMap<String, Place> = HashMap::new();
        for change in batch {
            Self::apply_change(&mut fresh, change, &self.merge);
        }

        let removed: Vec<String> = {
            let mut guard = self.places.write().await;
            let removed = guard
                .keys()
                .filter(|id| !fresh.contains_key(*id))
                .cloned()
                .collect();
            *guard = fresh;
            removed
        };

        for id in removed {
            self.signal(SyncSignal::PlaceRemoved(id));
        }
        self.signal(SyncSignal::PlacesChanged);
    }

    async fn apply_batch(&self, batch: ChangeBatch) {
        let mut removed = Vec::new();
        let changed = {
            let mut guard = self.places.write().await;
            let mut changed = false;
            for change in batch {
                let is_tombstone = change.data.is_none();
                let doc_id = change.doc_id.clone();
                if Self::apply_change(&mut guard, change, &self.merge) {
                    changed = true;
                    if is_tombstone {
                        removed.push(doc_id);
                    }
                }
            }
            changed
        };

        for id in removed {
            self.signal(SyncSignal::PlaceRemoved(id));
        }
        if changed {
            self.signal(SyncSignal::PlacesChanged);
        }
    }

    /// Applies one change to a place set. Returns whether anything changed.
    fn apply_change(
        places: &mut HashMap<String, Place>,
        change: crate::transport::DocChange,
        merge: &MergeConfig,
    ) -> bool {
        let Some(data) = change.data else {
            return places.remove(&change.doc_id).is_some();
        };

        let incoming: Place = match serde_json::from_value(data) {
            Ok(place) => place,
            Err(e) => {
                warn!(doc_id = %change.doc_id, error = %e, "Skipping corrupt place document");
                return false;
            }
        };

        // Same id: wholesale replacement, trivially idempotent.
        if places.contains_key(&incoming.id) {
            places.insert(incoming.id.clone(), incoming);
            return true;
        }

        let existing: Vec<Place> = places.values().cloned().collect();
        match resolve_candidate(&incoming.id, incoming.location, &existing, merge) {
            MergeOutcome::Nearby(target_id) => {
                debug!(incoming = %incoming.id, into = %target_id,
                    "Folding remote place into nearby local pin");
                let Some(target) = places.get_mut(&target_id) else {
                    return false;
                };
                let mut added = false;
                for visit in incoming.visits {
                    if target.visit(visit.id).is_none() {
                        target.visits.push(visit);
                        added = true;
                    }
                }
                added
            }
            MergeOutcome::ExactId(_) | MergeOutcome::New => {
                places.insert(incoming.id.clone(), incoming);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use chrono::NaiveDate;
    use domain::models::{GeoPoint, Grade, Visit};

    fn place(id: &str, lat: f64, lng: f64, visits: Vec<Visit>) -> Place {
        Place {
            id: id.to_string(),
            name: format!("Place {id}"),
            address: String::new(),
            location: GeoPoint { lat, lng },
            visits,
        }
    }

    fn visit(day: u32) -> Visit {
        Visit {
            id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
            photo_ref: "photos/v.jpg".to_string(),
            photos: vec![],
            grade: Grade::A,
            comment: String::new(),
            created_by: Uuid::new_v4(),
            creator_name: "Ana".to_string(),
            creator_photo_ref: None,
            created_by_guest: false,
        }
    }

    async fn write_place(store: &MemoryStore, map_id: Uuid, p: &Place) {
        store
            .write(
                &collections::places(map_id),
                &p.id,
                serde_json::to_value(p).unwrap(),
            )
            .await
            .unwrap();
    }

    async fn wait_live(engine: &SyncEngine) {
        let mut rx = engine.watch_state();
        tokio::time::timeout(
            Duration::from_secs(2),
            rx.wait_for(|s| *s == SubscriptionState::Live),
        )
        .await
        .expect("engine should go live")
        .unwrap();
    }

    async fn wait_for_places(engine: &SyncEngine, count: usize) -> Vec<Place> {
        for _ in 0..100 {
            let places = engine.places().await;
            if places.len() == count {
                return places;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("mirror never reached {count} places");
    }

    #[tokio::test]
    async fn test_snapshot_then_live_updates() {
        let store = Arc::new(MemoryStore::new());
        let map_id = Uuid::new_v4();
        write_place(&store, map_id, &place("a", 40.0, -73.0, vec![visit(1)])).await;

        let engine = SyncEngine::start(store.clone(), map_id, MergeConfig::default());
        wait_live(&engine).await;
        let places = wait_for_places(&engine, 1).await;
        assert_eq!(places[0].id, "a");

        // A distant place arrives over the live stream.
        write_place(&store, map_id, &place("b", 41.0, -72.0, vec![visit(2)])).await;
        wait_for_places(&engine, 2).await;

        engine.shutdown().await;
        assert_eq!(engine.state(), SubscriptionState::Unsubscribed);
    }

    #[tokio::test]
    async fn test_nearby_remote_place_folds_into_local_pin() {
        let store = Arc::new(MemoryStore::new());
        let map_id = Uuid::new_v4();
        write_place(&store, map_id, &place("a", 40.0, -73.0, vec![visit(1)])).await;

        let engine = SyncEngine::start(store.clone(), map_id, MergeConfig::default());
        wait_live(&engine).await;
        wait_for_places(&engine, 1).await;

        // ~45 m away under a different provider id.
        let v = visit(2);
        write_place(
            &store,
            map_id,
            &place("b", 40.00035, -73.00002, vec![v.clone()]),
        )
        .await;

        for _ in 0..100 {
            let places = engine.places().await;
            if places.len() == 1 && places[0].visits.len() == 2 {
                assert_eq!(places[0].id, "a");
                assert!(places[0].visit(v.id).is_some());
                engine.shutdown().await;
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("remote place never folded into local pin");
    }

    #[tokio::test]
    async fn test_redelivered_batch_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let map_id = Uuid::new_v4();
        let v = visit(1);
        let p = place("b", 40.00035, -73.00002, vec![v.clone()]);
        write_place(&store, map_id, &place("a", 40.0, -73.0, vec![visit(2)])).await;

        let engine = SyncEngine::start(store.clone(), map_id, MergeConfig::default());
        wait_live(&engine).await;
        wait_for_places(&engine, 1).await;

        // Deliver the same nearby document twice.
        write_place(&store, map_id, &p).await;
        write_place(&store, map_id, &p).await;

        for _ in 0..100 {
            let places = engine.places().await;
            if places.len() == 1 && places[0].visits.len() == 2 {
                engine.shutdown().await;
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("visits were duplicated on re-delivery");
    }

    #[tokio::test]
    async fn test_tombstone_signals_removal() {
        let store = Arc::new(MemoryStore::new());
        let map_id = Uuid::new_v4();
        write_place(&store, map_id, &place("a", 40.0, -73.0, vec![visit(1)])).await;

        let engine = SyncEngine::start(store.clone(), map_id, MergeConfig::default());
        wait_live(&engine).await;
        wait_for_places(&engine, 1).await;

        let mut signals = engine.subscribe_signals();
        store
            .delete(&collections::places(map_id), "a")
            .await
            .unwrap();

        loop {
            let signal = tokio::time::timeout(Duration::from_secs(2), signals.recv())
                .await
                .expect("expected a removal signal")
                .unwrap();
            if let SyncSignal::PlaceRemoved(id) = signal {
                assert_eq!(id, "a");
                break;
            }
        }
        assert!(engine.places().await.is_empty());
        engine.shutdown().await;
    }
}
