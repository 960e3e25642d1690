
use std::sync::Arc;

use chat_history::{ChannelStats, ChatHistoryStore};
use tokio_util::sync::CancellationToken;
use twitch_irc::{ChatEvent, ClientStatus, IrcClient, IrcConfig, IrcError};

use crate::config::AppConfig;
use crate::hub::{ChannelAction, Hub, HubMessage, Observer, ObserverId};
use crate::ingest::IngestSink;
use crate::status::{StatusReporter, StatusSnapshot};

/// Number of history entries returned when the caller does not ask for a
/// specific amount.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Chat monitoring core: client, history, hub and status behind one handle.
/// Cheap to clone.
#[derive(Clone)]
pub struct ChatMonitor {
    inner: Arc<MonitorInner>,
}

struct MonitorInner {
    client: IrcClient,
    store: Arc<ChatHistoryStore>,
    reporter: Arc<StatusReporter>,
    hub: Hub,
    shutdown_token: CancellationToken,
}

impl ChatMonitor {
    pub fn new(config: &AppConfig) -> Result<Self, IrcError> {
        Self::with_parts(
            config.irc_config(),
            config.history_capacity,
            config.observer_queue_capacity,
        )
    }

    pub fn with_parts(
        irc: IrcConfig,
        history_capacity: usize,
        observer_queue_capacity: usize,
    ) -> Result<Self, IrcError> {
        let store = Arc::new(ChatHistoryStore::new(history_capacity));
        let reporter = Arc::new(StatusReporter::new());
        let hub = Hub::new(observer_queue_capacity);
        let sink = IngestSink::new(store.clone(), reporter.clone(), hub.clone());
        let client = IrcClient::new(irc, Arc::new(sink))?;

        Ok(Self {
            inner: Arc::new(MonitorInner {
                client,
                store,
                reporter,
                hub,
                shutdown_token: CancellationToken::new(),
            }),
        })
    }

    /// Connect, or retry after the reconnect budget was spent.
    pub fn start(&self) {
        self.inner.client.start();
    }

    pub async fn stop(&self) {
        self.inner.client.stop().await;
    }

    pub fn subscribe(&self, channel: &str) -> Result<bool, IrcError> {
        self.inner.client.subscribe(channel)
    }

    /// Leave a channel. Its history stays available.
    pub fn unsubscribe(&self, channel: &str) -> Result<bool, IrcError> {
        self.inner.client.unsubscribe(channel)
    }

    /// Leave a channel and discard its history.
    pub fn remove_channel(&self, channel: &str) -> Result<bool, IrcError> {
        let unsubscribed = self.inner.client.unsubscribe(channel)?;
        let discarded = self.inner.store.remove(channel);
        if discarded {
            tracing::info!(channel, "Channel history discarded");
        }
        Ok(unsubscribed || discarded)
    }

    pub fn channels(&self) -> Vec<String> {
        self.inner.client.channels()
    }

    pub fn is_subscribed(&self, channel: &str) -> bool {
        self.inner.client.is_subscribed(channel)
    }

    /// Register an observer. Its first message is the current connection
    /// status.
    pub fn register(&self) -> Observer {
        self.inner
            .hub
            .register_with(HubMessage::ConnectionStatus(self.status()))
    }

    pub fn deregister(&self, id: ObserverId) -> bool {
        self.inner.hub.deregister(id)
    }

    pub fn hub(&self) -> &Hub {
        &self.inner.hub
    }

    /// Last `limit` messages of a channel, oldest first.
    pub fn history(&self, channel: &str, limit: usize) -> Vec<Arc<ChatEvent>> {
        self.inner.store.recent(channel, limit)
    }

    /// Empty a channel's history and tell observers about it.
    pub fn clear_history(&self, channel: &str) -> bool {
        let cleared = self.inner.store.clear(channel);
        if cleared {
            self.inner.hub.broadcast(HubMessage::channel_update(
                ChannelAction::Cleared,
                twitch_irc::channel_name(channel),
            ));
        }
        cleared
    }

    pub fn channel_stats(&self, channel: &str) -> Option<ChannelStats> {
        self.inner.store.stats(channel, chrono::Utc::now())
    }

    pub fn status(&self) -> StatusSnapshot {
        self.inner.reporter.snapshot(&self.inner.client.status())
    }

    pub fn client_status(&self) -> ClientStatus {
        self.inner.client.status()
    }

    /// Cancelled once the application begins shutting down.
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.inner.shutdown_token
    }
}
