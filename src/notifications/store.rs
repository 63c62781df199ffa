//! In-memory notification store

use std::collections::VecDeque;

use chrono::Utc;
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use super::{Notification, NotificationEvent, NotificationSink};

/// Oldest notifications are dropped past this many per user
pub const MAX_NOTIFICATIONS_PER_USER: usize = 100;

/// Per-user notification queues, newest last
#[derive(Default)]
pub struct NotificationStore {
    by_user: DashMap<String, VecDeque<Notification>>,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications for `user_id`, newest first
    pub fn list(&self, user_id: &str, unread_only: bool) -> Vec<Notification> {
        self.by_user
            .get(user_id)
            .map(|queue| {
                queue
                    .iter()
                    .rev()
                    .filter(|n| !unread_only || !n.read)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn unread_count(&self, user_id: &str) -> usize {
        self.by_user
            .get(user_id)
            .map(|queue| queue.iter().filter(|n| !n.read).count())
            .unwrap_or(0)
    }

    /// Mark one notification read. Returns false if it does not exist.
    pub fn mark_read(&self, user_id: &str, notification_id: &str) -> bool {
        let Some(mut queue) = self.by_user.get_mut(user_id) else {
            return false;
        };
        match queue.iter_mut().find(|n| n.id == notification_id) {
            Some(n) => {
                n.read = true;
                true
            }
            None => false,
        }
    }

    /// Mark everything read, returning how many changed
    pub fn mark_all_read(&self, user_id: &str) -> usize {
        let Some(mut queue) = self.by_user.get_mut(user_id) else {
            return 0;
        };
        let mut changed = 0;
        for n in queue.iter_mut().filter(|n| !n.read) {
            n.read = true;
            changed += 1;
        }
        changed
    }
}

impl NotificationSink for NotificationStore {
    fn notify(&self, user_id: &str, event: NotificationEvent) {
        let notification = Notification {
            id: Uuid::new_v4().to_string(),
            kind: event.kind,
            title: event.title,
            message: event.message,
            data: event.data,
            read: false,
            created_at: Utc::now(),
        };

        debug!(user = %user_id, kind = ?notification.kind, "Notification queued");

        let mut queue = self.by_user.entry(user_id.to_string()).or_default();
        queue.push_back(notification);
        while queue.len() > MAX_NOTIFICATIONS_PER_USER {
            queue.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::NotificationKind;

    fn event(title: &str) -> NotificationEvent {
        NotificationEvent::new(NotificationKind::StarDiscovered, title, "found it")
    }

    #[test]
    fn test_list_newest_first() {
        let store = NotificationStore::new();
        store.notify("alice", event("one"));
        store.notify("alice", event("two"));
        store.notify("bob", event("other"));

        let titles: Vec<_> = store.list("alice", false).into_iter().map(|n| n.title).collect();
        assert_eq!(titles, vec!["two", "one"]);
        assert!(store.list("carol", false).is_empty());
    }

    #[test]
    fn test_cap_drops_oldest() {
        let store = NotificationStore::new();
        for i in 0..MAX_NOTIFICATIONS_PER_USER + 5 {
            store.notify("alice", event(&format!("n{}", i)));
        }

        let all = store.list("alice", false);
        assert_eq!(all.len(), MAX_NOTIFICATIONS_PER_USER);
        assert_eq!(all.last().map(|n| n.title.as_str()), Some("n5"));
    }

    #[test]
    fn test_mark_read() {
        let store = NotificationStore::new();
        store.notify("alice", event("one"));
        store.notify("alice", event("two"));
        assert_eq!(store.unread_count("alice"), 2);

        let id = store.list("alice", false)[0].id.clone();
        assert!(store.mark_read("alice", &id));
        assert!(!store.mark_read("alice", "nope"));
        assert!(!store.mark_read("bob", &id));
        assert_eq!(store.unread_count("alice"), 1);
        assert_eq!(store.list("alice", true).len(), 1);

        assert_eq!(store.mark_all_read("alice"), 1);
        assert_eq!(store.unread_count("alice"), 0);
    }
}
