//! In-process document store.
//!
//! Backs tests and the default single-node deployment. Each collection is a
//! document map plus a broadcast channel; `subscribe` delivers the current
//! snapshot as the first batch and live batches after. Send errors are
//! ignored when no subscriber is listening.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};

use crate::transport::{ChangeBatch, ChangeStream, DocChange, DocumentStore, TransportError};

const CHANNEL_CAPACITY: usize = 256;

struct Collection {
    docs: HashMap<String, serde_json::Value>,
    publisher: broadcast::Sender<ChangeBatch>,
}

impl Collection {
    fn new() -> Self {
        let (publisher, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            docs: HashMap::new(),
            publisher,
        }
    }

    fn publish(&self, batch: ChangeBatch) {
        let _ = self.publisher.send(batch);
    }
}

/// In-memory implementation of [`DocumentStore`].
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn subscribe(&self, collection: &str) -> Result<ChangeStream, TransportError> {
        let mut collections = self.collections.write().await;
        let coll = collections
            .entry(collection.to_string())
            .or_insert_with(Collection::new);

        // Snapshot and receiver are taken under the same lock, so no batch
        // published after the snapshot can be missed by the receiver.
        let snapshot: ChangeBatch = coll
            .docs
            .iter()
            .map(|(id, data)| DocChange::upsert(id.clone(), data.clone()))
            .collect();
        let receiver = coll.publisher.subscribe();

        Ok(ChangeStream::new(snapshot, receiver))
    }

    async fn write(
        &self,
        collection: &str,
        doc_id: &str,
        data: serde_json::Value,
    ) -> Result<(), TransportError> {
        let mut collections = self.collections.write().await;
        let coll = collections
            .entry(collection.to_string())
            .or_insert_with(Collection::new);
        coll.docs.insert(doc_id.to_string(), data.clone());
        coll.publish(vec![DocChange::upsert(doc_id, data)]);
        Ok(())
    }

    async fn delete(&self, collection: &str, doc_id: &str) -> Result<(), TransportError> {
        let mut collections = self.collections.write().await;
        if let Some(coll) = collections.get_mut(collection) {
            if coll.docs.remove(doc_id).is_some() {
                coll.publish(vec![DocChange::tombstone(doc_id)]);
            }
        }
        Ok(())
    }

    async fn get(
        &self,
        collection: &str,
        doc_id: &str,
    ) -> Result<Option<serde_json::Value>, TransportError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|c| c.docs.get(doc_id))
            .cloned())
    }

    async fn list(
        &self,
        collection: &str,
    ) -> Result<Vec<(String, serde_json::Value)>, TransportError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|c| {
                c.docs
                    .iter()
                    .map(|(id, data)| (id.clone(), data.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_write_then_get() {
        let store = MemoryStore::new();
        store.write("c", "a", json!({"n": 1})).await.unwrap();
        let doc = store.get("c", "a").await.unwrap();
        assert_eq!(doc, Some(json!({"n": 1})));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryStore::new();
        store.write("c", "a", json!(1)).await.unwrap();
        store.delete("c", "a").await.unwrap();
        store.delete("c", "a").await.unwrap();
        assert!(store.get("c", "a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_subscribe_snapshot_then_live() {
        let store = MemoryStore::new();
        store.write("c", "a", json!(1)).await.unwrap();

        let mut stream = store.subscribe("c").await.unwrap();
        let snapshot = stream.next().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].doc_id, "a");

        store.write("c", "b", json!(2)).await.unwrap();
        let live = stream.next().await.unwrap();
        assert_eq!(live[0].doc_id, "b");
    }

    #[tokio::test]
    async fn test_delete_publishes_tombstone() {
        let store = MemoryStore::new();
        store.write("c", "a", json!(1)).await.unwrap();

        let mut stream = store.subscribe("c").await.unwrap();
        let _snapshot = stream.next().await.unwrap();

        store.delete("c", "a").await.unwrap();
        let batch = stream.next().await.unwrap();
        assert_eq!(batch[0].doc_id, "a");
        assert!(batch[0].data.is_none());
    }

    #[tokio::test]
    async fn test_list_unknown_collection_is_empty() {
        let store = MemoryStore::new();
        assert!(store.list("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_absent_doc_publishes_nothing() {
        let store = MemoryStore::new();
        store.write("c", "a", json!(1)).await.unwrap();
        let mut stream = store.subscribe("c").await.unwrap();
        let _ = stream.next().await.unwrap();

        store.delete("c", "zzz").await.unwrap();
        store.write("c", "b", json!(2)).await.unwrap();

        // The next batch is the write, not a tombstone for the absent doc.
        let batch = stream.next().await.unwrap();
        assert_eq!(batch[0].doc_id, "b");
    }
}
