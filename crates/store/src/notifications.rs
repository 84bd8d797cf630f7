//! Notification persistence: per-recipient collections, newest first.

use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use domain::models::Notification;
use shared::pagination::{PageQuery, Paged};

use crate::error::StoreError;
use crate::metrics::OpTimer;
use crate::transport::{collections, DocumentStore};

/// Notification documents, one collection per recipient.
#[derive(Clone)]
pub struct NotificationStore {
    store: Arc<dyn DocumentStore>,
}

impl NotificationStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Persists one notification under its recipient's collection.
    pub async fn push(&self, notification: &Notification) -> Result<(), StoreError> {
        let data = serde_json::to_value(notification)
            .map_err(|e| StoreError::invalid_document(&notification.id.to_string(), e))?;
        self.store
            .write(
                &collections::notifications(notification.recipient_uid),
                &notification.id.to_string(),
                data,
            )
            .await?;
        Ok(())
    }

    /// Lists a recipient's notifications, newest first. Corrupt documents
    /// are skipped with a warning.
    pub async fn list(
        &self,
        recipient_uid: Uuid,
        query: PageQuery,
    ) -> Result<Paged<Notification>, StoreError> {
        let timer = OpTimer::new("list_notifications");
        let docs = self
            .store
            .list(&collections::notifications(recipient_uid))
            .await?;
        timer.record();

        let mut notifications: Vec<Notification> = Vec::with_capacity(docs.len());
        for (doc_id, data) in docs {
            match serde_json::from_value(data) {
                Ok(n) => notifications.push(n),
                Err(e) => {
                    warn!(doc_id = %doc_id, error = %e, "Skipping corrupt notification document");
                }
            }
        }
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(Paged::from_full(notifications, query))
    }

    /// Marks one notification read. Recipient-only: the collection path is
    /// derived from the caller's uid, so a foreign id simply is not found.
    pub async fn mark_read(
        &self,
        recipient_uid: Uuid,
        notification_id: Uuid,
    ) -> Result<Notification, StoreError> {
        let path = collections::notifications(recipient_uid);
        let data = self
            .store
            .get(&path, &notification_id.to_string())
            .await?
            .ok_or_else(|| StoreError::not_found(format!("notification {notification_id}")))?;
        let mut notification: Notification = serde_json::from_value(data)
            .map_err(|e| StoreError::invalid_document(&notification_id.to_string(), e))?;

        if !notification.read {
            notification.read = true;
            let updated = serde_json::to_value(&notification)
                .map_err(|e| StoreError::invalid_document(&notification_id.to_string(), e))?;
            self.store
                .write(&path, &notification_id.to_string(), updated)
                .await?;
        }
        Ok(notification)
    }
}
