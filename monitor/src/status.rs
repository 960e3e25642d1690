//! Connection, uptime and throughput summary for external reporting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use twitch_irc::{ClientStatus, ConnectionState};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub connected: bool,
    pub state: ConnectionState,
    pub channel_count: usize,
    pub message_count: u64,
    pub uptime_secs: u64,
    /// e.g. `1h 2m 3s`
    pub uptime: String,
    pub reconnect_attempts: u32,
    pub reconnect_exhausted: bool,
    pub last_transition_at: Option<DateTime<Utc>>,
}

/// Last state seen by the reporter and when it changed.
#[derive(Debug, Clone, Copy)]
struct Transition {
    state: ConnectionState,
    at: DateTime<Utc>,
}

pub struct StatusReporter {
    started: Instant,
    messages: AtomicU64,
    last: Mutex<Option<Transition>>,
}

impl Default for StatusReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusReporter {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            messages: AtomicU64::new(0),
            last: Mutex::new(None),
        }
    }

    pub fn record_message(&self) {
        self.messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_count(&self) -> u64 {
        self.messages.load(Ordering::Relaxed)
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// Remember `status.state`. Returns `true` when it differs from the
    /// previously observed state.
    pub fn observe(&self, status: &ClientStatus) -> bool {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if last.is_some_and(|t| t.state == status.state) {
            return false;
        }
        *last = Some(Transition {
            state: status.state,
            at: Utc::now(),
        });
        true
    }

    pub fn snapshot(&self, status: &ClientStatus) -> StatusSnapshot {
        let uptime = self.uptime();
        let last_transition_at = self
            .last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .map(|t| t.at);
        StatusSnapshot {
            connected: status.connected,
            state: status.state,
            channel_count: status.subscribed_channel_count,
            message_count: self.message_count(),
            uptime_secs: uptime.as_secs(),
            uptime: format_uptime(uptime),
            reconnect_attempts: status.reconnect_attempts,
            reconnect_exhausted: status.reconnect_exhausted,
            last_transition_at,
        }
    }
}

/// Format a duration as `Xh Ym Zs`, omitting leading zero units.
pub fn format_uptime(uptime: Duration) -> String {
    let total = uptime.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}
