//! Bridges the chat client into the history store, reporter and hub.

use std::sync::Arc;

use chat_history::ChatHistoryStore;
use twitch_irc::{ChatEvent, ChatSink, ClientStatus};

use crate::hub::{ChannelAction, Hub, HubMessage};
use crate::status::StatusReporter;

pub struct IngestSink {
    store: Arc<ChatHistoryStore>,
    reporter: Arc<StatusReporter>,
    hub: Hub,
}

impl IngestSink {
    pub fn new(store: Arc<ChatHistoryStore>, reporter: Arc<StatusReporter>, hub: Hub) -> Self {
        Self {
            store,
            reporter,
            hub,
        }
    }
}

impl ChatSink for IngestSink {
    fn on_chat(&self, event: ChatEvent) {
        let event = Arc::new(event);
        self.store.append(event.clone());
        self.reporter.record_message();
        self.hub.broadcast(HubMessage::ChatMessage(event));
    }

    fn on_subscribed(&self, channel: &str) {
        self.store.ensure_channel(channel);
        self.hub.broadcast(HubMessage::channel_update(ChannelAction::Added, channel));
    }

    fn on_unsubscribed(&self, channel: &str) {
        self.hub.broadcast(HubMessage::channel_update(ChannelAction::Removed, channel));
    }

    fn on_status(&self, status: &ClientStatus) {
        // Exhaustion arrives without a state change.
        if self.reporter.observe(status) || status.reconnect_exhausted {
            self.hub.broadcast(HubMessage::ConnectionStatus(self.reporter.snapshot(status)));
        }
    }
}

#[cfg(test)]
mod tests {
    use twitch_irc::ConnectionState;

    use super::*;

    fn sink() -> (IngestSink, Arc<ChatHistoryStore>, Arc<StatusReporter>, Hub) {
        let store = Arc::new(ChatHistoryStore::new(10));
        let reporter = Arc::new(StatusReporter::new());
        let hub = Hub::default();
        let sink = IngestSink::new(store.clone(), reporter.clone(), hub.clone());
        (sink, store, reporter, hub)
    }

    fn status(state: ConnectionState, exhausted: bool) -> ClientStatus {
        ClientStatus {
            state,
            connected: state == ConnectionState::Ready,
            subscribed_channel_count: 1,
            reconnect_attempts: 0,
            reconnect_exhausted: exhausted,
        }
    }

    #[test]
    fn chat_reaches_store_reporter_and_hub() {
        let (sink, store, reporter, hub) = sink();
        let mut observer = hub.register();

        sink.on_chat(ChatEvent::new("shroud", "viewer", "gg"));

        assert_eq!(store.len("shroud"), 1);
        assert_eq!(reporter.message_count(), 1);
        let message = observer.try_recv().unwrap();
        let HubMessage::ChatMessage(event) = message.as_ref() else {
            panic!("expected chat message, got {message:?}");
        };
        assert!(Arc::ptr_eq(event, &store.recent("shroud", 1)[0]));
    }

    #[test]
    fn subscription_changes_are_announced() {
        let (sink, store, _, hub) = sink();
        let mut observer = hub.register();

        sink.on_subscribed("shroud");
        sink.on_unsubscribed("shroud");

        assert!(store.contains("shroud"));
        let actions: Vec<ChannelAction> = std::iter::from_fn(|| observer.try_recv())
            .map(|m| match m.as_ref() {
                HubMessage::ChannelUpdate(update) => update.action,
                other => panic!("unexpected message: {other:?}"),
            })
            .collect();
        assert_eq!(actions, vec![ChannelAction::Added, ChannelAction::Removed]);
    }

    #[test]
    fn status_published_on_transition_and_exhaustion() {
        let (sink, _, _, hub) = sink();
        let mut observer = hub.register();

        sink.on_status(&status(ConnectionState::Connecting, false));
        sink.on_status(&status(ConnectionState::Connecting, false));
        sink.on_status(&status(ConnectionState::Disconnected, false));
        sink.on_status(&status(ConnectionState::Disconnected, true));

        let exhausted: Vec<bool> = std::iter::from_fn(|| observer.try_recv())
            .map(|m| match m.as_ref() {
                HubMessage::ConnectionStatus(snapshot) => snapshot.reconnect_exhausted,
                other => panic!("unexpected message: {other:?}"),
            })
            .collect();
        assert_eq!(exhausted, vec![false, false, true]);
    }
}
