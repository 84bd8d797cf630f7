//! Document store transport abstraction.
//!
//! The remote store exposes collections of JSON documents with (1) a
//! push-based change stream per collection and (2) request/response
//! write/delete/read calls. Delivery is at-least-once: a batch may be
//! re-delivered, and applying an already-applied change must be idempotent
//! (consumers replace whole documents by id, so re-application is a no-op).

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

/// One document change inside a batch. `data == None` is a tombstone.
#[derive(Debug, Clone)]
pub struct DocChange {
    pub doc_id: String,
    pub data: Option<serde_json::Value>,
}

impl DocChange {
    pub fn upsert(doc_id: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            doc_id: doc_id.into(),
            data: Some(data),
        }
    }

    pub fn tombstone(doc_id: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            data: None,
        }
    }
}

/// A batch of changes pushed by the store.
pub type ChangeBatch = Vec<DocChange>;

/// Transport-level failures.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("subscription channel closed")]
    Closed,

    #[error("subscriber lagged behind by {0} batches")]
    Lagged(u64),

    #[error("write failed: {0}")]
    WriteFailed(String),

    #[error("read failed: {0}")]
    ReadFailed(String),
}

/// A live change stream for one collection.
///
/// The initial snapshot of the collection is delivered as the first batch,
/// then live batches follow in publication order.
pub struct ChangeStream {
    initial: Option<ChangeBatch>,
    live: broadcast::Receiver<ChangeBatch>,
}

impl ChangeStream {
    pub(crate) fn new(initial: ChangeBatch, live: broadcast::Receiver<ChangeBatch>) -> Self {
        Self {
            initial: Some(initial),
            live,
        }
    }

    /// Waits for the next change batch.
    ///
    /// A `Lagged` error means batches were dropped; the caller must
    /// resubscribe to resynchronize from a fresh snapshot.
    pub async fn next(&mut self) -> Result<ChangeBatch, TransportError> {
        if let Some(batch) = self.initial.take() {
            return Ok(batch);
        }
        match self.live.recv().await {
            Ok(batch) => Ok(batch),
            Err(broadcast::error::RecvError::Closed) => Err(TransportError::Closed),
            Err(broadcast::error::RecvError::Lagged(n)) => Err(TransportError::Lagged(n)),
        }
    }
}

/// The document store contract consumed by this layer.
///
/// `get`/`list` are the request/response read side of the same collections;
/// mutation paths use them for the check-then-write sequence, while mirrors
/// are fed exclusively from `subscribe`.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Opens a change stream for `collection`, snapshot first.
    async fn subscribe(&self, collection: &str) -> Result<ChangeStream, TransportError>;

    /// Creates or fully replaces one document.
    async fn write(
        &self,
        collection: &str,
        doc_id: &str,
        data: serde_json::Value,
    ) -> Result<(), TransportError>;

    /// Deletes one document. Deleting an absent document is a no-op.
    async fn delete(&self, collection: &str, doc_id: &str) -> Result<(), TransportError>;

    /// Reads one document.
    async fn get(
        &self,
        collection: &str,
        doc_id: &str,
    ) -> Result<Option<serde_json::Value>, TransportError>;

    /// Reads a whole collection.
    async fn list(&self, collection: &str) -> Result<Vec<(String, serde_json::Value)>, TransportError>;
}

/// Collection path helpers. Document layout:
/// - `maps` — one document per map record
/// - `maps/{map_id}/places` — one document per place, keyed by provider id
/// - `notifications/{uid}` — one document per notification
pub mod collections {
    use uuid::Uuid;

    pub const MAPS: &str = "maps";

    pub fn places(map_id: Uuid) -> String {
        format!("maps/{map_id}/places")
    }

    pub fn notifications(uid: Uuid) -> String {
        format!("notifications/{uid}")
    }
}
