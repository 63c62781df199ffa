//! Player notifications
//!
//! Game services push events through `NotificationSink` and never wait on
//! delivery. `NotificationStore` keeps the most recent events per user in
//! memory for the notification routes.

mod store;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub use store::{NotificationStore, MAX_NOTIFICATIONS_PER_USER};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    StarDiscovered,
    StarClaimed,
    LevelUp,
    RewardCredited,
    QuestJoined,
}

/// Event handed to a sink
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub data: serde_json::Value,
}

impl NotificationEvent {
    pub fn new(kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
            data: serde_json::Value::Null,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}

/// Stored notification as returned to clients
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub data: serde_json::Value,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Fire-and-forget delivery of player events
pub trait NotificationSink: Send + Sync {
    fn notify(&self, user_id: &str, event: NotificationEvent);
}
