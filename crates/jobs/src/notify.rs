// crates/jobs/src/notify.rs
//! Publish/subscribe channel for ephemeral notifications.
//!
//! Publishers hold no reference to whoever is listening. Delivery is
//! best-effort and at most once: a subscriber only sees notifications
//! published while it is subscribed, and nothing is replayed.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

const CHANNEL_CAPACITY: usize = 16;

/// What activating a notification should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationAction {
    /// Open the job result surface.
    OpenSurface,
}

/// An ephemeral, non-persisted notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<NotificationAction>,
}

impl Notification {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            action: None,
        }
    }

    pub fn with_action(mut self, action: NotificationAction) -> Self {
        self.action = Some(action);
        self
    }
}

/// Process-wide notification channel. Clones share the same subscribers.
#[derive(Clone)]
pub struct NotificationChannel {
    tx: broadcast::Sender<Notification>,
}

impl NotificationChannel {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Deliver to every current subscriber. Returns how many received it.
    pub fn publish(&self, notification: Notification) -> usize {
        tracing::debug!(title = %notification.title, "Publishing notification");
        // No subscribers is fine.
        self.tx.send(notification).unwrap_or(0)
    }

    /// Register a subscriber. Dropping the subscription deregisters it.
    pub fn subscribe(&self) -> NotificationSubscription {
        NotificationSubscription {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for NotificationChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// A live registration on a [`NotificationChannel`].
pub struct NotificationSubscription {
    rx: broadcast::Receiver<Notification>,
}

impl NotificationSubscription {
    /// Wait for the next notification.
    ///
    /// A subscriber that fell behind skips to the newest notifications.
    /// Returns `None` once every publisher is gone.
    pub async fn recv(&mut self) -> Option<Notification> {
        loop {
            match self.rx.recv().await {
                Ok(notification) => return Some(notification),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Notification subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next already-published notification without waiting.
    pub fn try_recv(&mut self) -> Option<Notification> {
        loop {
            match self.rx.try_recv() {
                Ok(notification) => return Some(notification),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Notification subscriber lagged");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Deregister explicitly. Equivalent to dropping the subscription.
    pub fn unsubscribe(self) {}
}
