//! Bounded in-memory chat history, one ring buffer per channel.

pub mod stats;

use std::collections::VecDeque;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use twitch_irc::{ChatEvent, channel_name as channel_key};

pub use stats::ChannelStats;

pub const DEFAULT_CAPACITY: usize = 1000;

/// Per-channel message history capped at a fixed number of events.
///
/// Each channel's buffer sits behind its own map shard lock, so appends from
/// the ingestion task and reads from query paths only contend per channel.
pub struct ChatHistoryStore {
    capacity: usize,
    channels: DashMap<String, VecDeque<Arc<ChatEvent>>>,
}

impl Default for ChatHistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ChatHistoryStore {
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            channels: DashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append an event to its channel, evicting the oldest entries beyond
    /// capacity. Unknown channels are created.
    pub fn append(&self, event: Arc<ChatEvent>) {
        let mut buffer = self.channels.entry(event.channel.clone()).or_default();
        while buffer.len() >= self.capacity {
            buffer.pop_front();
        }
        buffer.push_back(event);
    }

    /// The last `limit` events of a channel, oldest first.
    pub fn recent(&self, channel: &str, limit: usize) -> Vec<Arc<ChatEvent>> {
        let Some(buffer) = self.channels.get(&channel_key(channel)) else {
            return Vec::new();
        };
        let skip = buffer.len().saturating_sub(limit);
        buffer.iter().skip(skip).cloned().collect()
    }

    /// Create an empty buffer for a channel. Returns `true` if it was new.
    pub fn ensure_channel(&self, channel: &str) -> bool {
        match self.channels.entry(channel_key(channel)) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(VecDeque::new());
                true
            }
        }
    }

    /// Empty a channel's buffer, keeping the channel. Returns whether it existed.
    pub fn clear(&self, channel: &str) -> bool {
        match self.channels.get_mut(&channel_key(channel)) {
            Some(mut buffer) => {
                let cleared = buffer.len();
                buffer.clear();
                tracing::debug!(channel, cleared, "Chat history cleared");
                true
            }
            None => false,
        }
    }

    /// Drop a channel and its history. Returns whether it existed.
    pub fn remove(&self, channel: &str) -> bool {
        self.channels.remove(&channel_key(channel)).is_some()
    }

    pub fn len(&self, channel: &str) -> usize {
        self.channels
            .get(&channel_key(channel))
            .map_or(0, |buffer| buffer.len())
    }

    pub fn contains(&self, channel: &str) -> bool {
        self.channels.contains_key(&channel_key(channel))
    }

    /// Known channels, sorted.
    pub fn channels(&self) -> Vec<String> {
        let mut names: Vec<String> = self.channels.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}
