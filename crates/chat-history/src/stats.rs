//! Activity summary derived from a channel's retained history.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::ChatHistoryStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStats {
    pub message_count: usize,
    pub unique_users: usize,
    /// Mean body length in characters, rounded.
    pub avg_message_length: usize,
    pub messages_per_minute: usize,
}

impl ChatHistoryStore {
    /// Summarize the retained history of a channel as of `now`.
    ///
    /// Returns `None` for unknown channels.
    pub fn stats(&self, channel: &str, now: DateTime<Utc>) -> Option<ChannelStats> {
        if !self.contains(channel) {
            return None;
        }
        let history = self.recent(channel, usize::MAX);
        let minute_ago = now - Duration::minutes(1);

        let mut users = HashSet::new();
        let mut total_chars = 0usize;
        let mut last_minute = 0usize;
        for event in &history {
            users.insert(event.username.as_str());
            total_chars += event.text.chars().count();
            if event.received_at > minute_ago {
                last_minute += 1;
            }
        }

        let avg_message_length = if history.is_empty() {
            0
        } else {
            (total_chars as f64 / history.len() as f64).round() as usize
        };

        Some(ChannelStats {
            message_count: history.len(),
            unique_users: users.len(),
            avg_message_length,
            messages_per_minute: last_minute,
        })
    }
}
