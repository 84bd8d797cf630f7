//! Notification delivery.
//!
//! Planning (who gets what) is pure and lives in the domain crate; this
//! service only writes the planned notifications. Delivery is best-effort:
//! the mutation that triggered the fan-out has already committed, so a
//! failed delivery is logged and dropped, never retried and never allowed
//! to fail the request.

use domain::models::Notification;
use store::metrics::record_notifications_fanned_out;
use store::NotificationStore;
use tracing::warn;

#[derive(Clone)]
pub struct NotificationFanout {
    store: NotificationStore,
}

impl NotificationFanout {
    pub fn new(store: NotificationStore) -> Self {
        Self { store }
    }

    /// Delivers planned notifications, returning how many were written.
    pub async fn deliver(&self, notifications: Vec<Notification>) -> usize {
        let mut delivered = 0;
        for notification in notifications {
            match self.store.push(&notification).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(
                    recipient = %notification.recipient_uid,
                    kind = %notification.kind,
                    error = %e,
                    "Dropped undeliverable notification"
                ),
            }
        }
        if delivered > 0 {
            record_notifications_fanned_out(delivered);
        }
        delivered
    }
}
