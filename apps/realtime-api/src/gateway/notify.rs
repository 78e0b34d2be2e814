//! Notification fan-out: persist first, then deliver live or hand off to
//! web push.

use std::sync::Arc;

use serde_json::Value;

use crate::models::notification::{NewNotification, Notification, NotificationView};
use crate::models::user::UserSummary;
use crate::store::{NotificationStore, PushSender, StoreError, UserStore};

use super::events::ServerEvent;
use super::registry::SessionRegistry;

pub struct Notifier {
    store: Arc<dyn NotificationStore>,
    users: Arc<dyn UserStore>,
    registry: Arc<SessionRegistry>,
    push: Arc<dyn PushSender>,
}

impl Notifier {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        users: Arc<dyn UserStore>,
        registry: Arc<SessionRegistry>,
        push: Arc<dyn PushSender>,
    ) -> Self {
        Self {
            store,
            users,
            registry,
            push,
        }
    }

    /// Record a notification and deliver it: live to every connection of
    /// the receiver, otherwise handed to web push when a subscription is
    /// known. Only the persist step can fail; delivery problems downgrade
    /// to log lines.
    pub async fn notify(&self, new: NewNotification) -> Result<Notification, StoreError> {
        let receiver_id = new.receiver_id.clone();
        let created = self.store.create(new).await?;

        // Re-read so delivery reflects exactly what was stored.
        let notification = match self.store.find_by_id(&created.id).await {
            Ok(notification) => notification,
            Err(err) => {
                tracing::warn!(%err, notification_id = created.id, "re-read after create failed");
                created.clone()
            }
        };

        let view = match self.enrich(notification).await {
            Ok(view) => view,
            Err(err) => {
                tracing::warn!(%err, "sender enrichment failed, skipping delivery");
                return Ok(created);
            }
        };

        let delivered = self
            .registry
            .send_to_user(&receiver_id, &ServerEvent::NewNotification(view.clone()));

        if delivered == 0 {
            if let Some(subscription) = self.registry.push_subscription(&receiver_id) {
                self.spawn_push(subscription, view);
            }
        }

        Ok(created)
    }

    /// Resolve the sender profile onto a stored notification.
    pub async fn enrich(&self, notification: Notification) -> Result<NotificationView, StoreError> {
        let sender = self.users.find_by_id(&notification.sender_id).await?;
        Ok(NotificationView::from_notification(
            notification,
            UserSummary::from(&sender),
        ))
    }

    fn spawn_push(&self, subscription: Value, view: NotificationView) {
        let push = Arc::clone(&self.push);
        tokio::spawn(async move {
            let payload = match serde_json::to_value(&view) {
                Ok(payload) => payload,
                Err(err) => {
                    tracing::warn!(%err, "failed to encode push payload");
                    return;
                }
            };
            if let Err(err) = push.send(&subscription, &payload).await {
                tracing::warn!(%err, "push delivery failed");
            }
        });
    }
}
