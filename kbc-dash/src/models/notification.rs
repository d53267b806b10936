//! Pipeline narration feed

use chrono::{DateTime, Utc};
use kbc_common::events::NotificationStatus;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Position in the feed, starting at 1
    pub sequence: u64,
    pub message: String,
    pub status: NotificationStatus,
    pub timestamp: DateTime<Utc>,
}

/// Append-only ordered history of stage notifications
///
/// A `waiting` entry is never replaced by its terminal entry; readers that
/// want the latest status look at the newest entry. Appending is restricted
/// to this crate so the stage sequencer stays the only writer.
#[derive(Debug, Clone, Default)]
pub struct NotificationFeed {
    entries: Vec<Notification>,
}

impl NotificationFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(
        &mut self,
        message: impl Into<String>,
        status: NotificationStatus,
    ) -> Notification {
        let notification = Notification {
            sequence: self.entries.len() as u64 + 1,
            message: message.into(),
            status,
            timestamp: Utc::now(),
        };
        self.entries.push(notification.clone());
        notification
    }

    /// Oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.entries.iter()
    }

    /// Display order
    pub fn newest_first(&self) -> impl Iterator<Item = &Notification> {
        self.entries.iter().rev()
    }
}
