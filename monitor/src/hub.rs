//! Fan-out of chat events and status updates to registered observers.
//!
//! Every observer owns a bounded queue. Broadcasting never waits: a full
//! queue loses that one message for that one observer, which is counted and
//! reported, while everyone else keeps receiving.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use twitch_irc::ChatEvent;
use uuid::Uuid;

use crate::status::StatusSnapshot;

pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

pub type ObserverId = Uuid;

/// Envelope delivered to observers, serialized as `{"type": ..., "data": ...}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum HubMessage {
    ChatMessage(Arc<ChatEvent>),
    ChannelUpdate(ChannelUpdate),
    ConnectionStatus(StatusSnapshot),
}

impl HubMessage {
    pub fn channel_update(action: ChannelAction, channel: impl Into<String>) -> Self {
        Self::ChannelUpdate(ChannelUpdate {
            action,
            channel: channel.into(),
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelUpdate {
    pub action: ChannelAction,
    pub channel: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelAction {
    Added,
    Removed,
    Cleared,
}

struct ObserverSlot {
    sender: mpsc::Sender<Arc<HubMessage>>,
    dropped: Arc<AtomicU64>,
    lagging: AtomicBool,
}

/// Receiving end handed out by [`Hub::register`].
///
/// Dropping it closes the queue; the hub prunes the registration on its next
/// broadcast.
pub struct Observer {
    id: ObserverId,
    receiver: mpsc::Receiver<Arc<HubMessage>>,
    dropped: Arc<AtomicU64>,
}

impl Observer {
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Wait for the next message. `None` once deregistered and drained.
    pub async fn recv(&mut self) -> Option<Arc<HubMessage>> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Arc<HubMessage>> {
        self.receiver.try_recv().ok()
    }

    /// Messages lost because this observer's queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Observer registry. Cheap to clone.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

struct HubInner {
    queue_capacity: usize,
    observers: DashMap<ObserverId, ObserverSlot>,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl Hub {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                queue_capacity: queue_capacity.max(1),
                observers: DashMap::new(),
            }),
        }
    }

    pub fn register(&self) -> Observer {
        self.register_inner(None)
    }

    /// Register an observer whose queue already holds `initial`, ahead of
    /// anything broadcast afterwards.
    pub fn register_with(&self, initial: HubMessage) -> Observer {
        self.register_inner(Some(initial))
    }

    fn register_inner(&self, initial: Option<HubMessage>) -> Observer {
        let id = Uuid::new_v4();
        let (sender, receiver) = mpsc::channel(self.inner.queue_capacity);
        let dropped = Arc::new(AtomicU64::new(0));
        if let Some(initial) = initial {
            // A fresh queue always has room.
            let _ = sender.try_send(Arc::new(initial));
        }
        self.inner.observers.insert(
            id,
            ObserverSlot {
                sender,
                dropped: dropped.clone(),
                lagging: AtomicBool::new(false),
            },
        );
        tracing::debug!(observer_id = %id, "Observer registered");
        Observer {
            id,
            receiver,
            dropped,
        }
    }

    /// Returns `false` if the observer was not registered.
    pub fn deregister(&self, id: ObserverId) -> bool {
        let removed = self.inner.observers.remove(&id).is_some();
        if removed {
            tracing::debug!(observer_id = %id, "Observer deregistered");
        }
        removed
    }

    pub fn observer_count(&self) -> usize {
        self.inner.observers.len()
    }

    /// Offer a message to every observer. Returns how many accepted it.
    pub fn broadcast(&self, message: HubMessage) -> usize {
        let message = Arc::new(message);
        let mut delivered = 0;
        let mut closed = Vec::new();

        for entry in self.inner.observers.iter() {
            let slot = entry.value();
            match slot.sender.try_send(message.clone()) {
                Ok(()) => {
                    delivered += 1;
                    if slot.lagging.swap(false, Ordering::Relaxed) {
                        tracing::info!(observer_id = %entry.key(), "Observer caught up");
                    }
                }
                Err(TrySendError::Full(_)) => {
                    let dropped = slot.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    if !slot.lagging.swap(true, Ordering::Relaxed) {
                        tracing::warn!(
                            observer_id = %entry.key(),
                            dropped,
                            "Observer queue full; dropping messages"
                        );
                    }
                }
                Err(TrySendError::Closed(_)) => closed.push(*entry.key()),
            }
        }

        // Removal needs the shard write lock, so it waits until iteration ends.
        for id in closed {
            if self.inner.observers.remove(&id).is_some() {
                tracing::debug!(observer_id = %id, "Pruned closed observer");
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat(text: &str) -> HubMessage {
        HubMessage::ChatMessage(Arc::new(ChatEvent::new("room", "alice", text)))
    }

    fn text_of(message: &HubMessage) -> &str {
        match message {
            HubMessage::ChatMessage(event) => &event.text,
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn stalled_observer_does_not_affect_others() {
        let hub = Hub::new(4);
        let mut readers: Vec<Observer> = (0..3).map(|_| hub.register()).collect();
        let stalled = hub.register();

        let mut received = vec![Vec::new(); readers.len()];
        for i in 0..10 {
            hub.broadcast(chat(&format!("m{i}")));
            for (reader, seen) in readers.iter_mut().zip(received.iter_mut()) {
                while let Some(message) = reader.try_recv() {
                    seen.push(text_of(&message).to_string());
                }
            }
        }

        let expected: Vec<String> = (0..10).map(|i| format!("m{i}")).collect();
        for seen in &received {
            assert_eq!(seen, &expected);
        }
        assert_eq!(stalled.dropped(), 6);
        assert!(readers.iter().all(|r| r.dropped() == 0));
    }

    #[tokio::test]
    async fn stalled_observer_keeps_the_oldest_messages_in_order() {
        let hub = Hub::new(2);
        let mut observer = hub.register();
        for i in 0..5 {
            hub.broadcast(chat(&format!("m{i}")));
        }
        assert_eq!(text_of(&observer.recv().await.unwrap()), "m0");
        assert_eq!(text_of(&observer.recv().await.unwrap()), "m1");
        assert!(observer.try_recv().is_none());
        assert_eq!(observer.dropped(), 3);

        hub.broadcast(chat("m5"));
        assert_eq!(text_of(&observer.recv().await.unwrap()), "m5");
    }

    #[test]
    fn register_with_delivers_initial_message_first() {
        let hub = Hub::new(1);
        let initial = HubMessage::channel_update(ChannelAction::Added, "room");
        let mut observer = hub.register_with(initial);
        hub.broadcast(chat("too late"));

        let first = observer.try_recv().unwrap();
        assert!(matches!(first.as_ref(), HubMessage::ChannelUpdate(_)));
        assert!(observer.try_recv().is_none());
        assert_eq!(observer.dropped(), 1);
    }

    #[test]
    fn deregister_is_idempotent() {
        let hub = Hub::default();
        let observer = hub.register();
        assert_eq!(hub.observer_count(), 1);
        assert!(hub.deregister(observer.id()));
        assert!(!hub.deregister(observer.id()));
        assert_eq!(hub.observer_count(), 0);
        assert!(!hub.deregister(Uuid::new_v4()));
    }

    #[tokio::test]
    async fn deregistered_observer_sees_end_of_stream() {
        let hub = Hub::default();
        let mut observer = hub.register();
        hub.broadcast(chat("before"));
        hub.deregister(observer.id());
        hub.broadcast(chat("after"));

        assert_eq!(text_of(&observer.recv().await.unwrap()), "before");
        assert!(observer.recv().await.is_none());
    }

    #[test]
    fn dropped_observers_are_pruned_on_broadcast() {
        let hub = Hub::default();
        let kept = hub.register();
        drop(hub.register());
        assert_eq!(hub.observer_count(), 2);

        assert_eq!(hub.broadcast(chat("hi")), 1);
        assert_eq!(hub.observer_count(), 1);
        assert!(hub.deregister(kept.id()));
    }

    #[test]
    fn broadcast_without_observers_is_a_no_op() {
        let hub = Hub::default();
        assert_eq!(hub.broadcast(chat("nobody listening")), 0);
    }

    #[test]
    fn messages_serialize_as_type_and_data() {
        let json: serde_json::Value =
            serde_json::from_str(&chat("hello @room").to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "chat_message");
        assert_eq!(json["data"]["channel"], "room");
        assert_eq!(json["data"]["displayName"], "alice");
        assert_eq!(json["data"]["isMentionOfChannel"], true);

        let update = HubMessage::channel_update(ChannelAction::Cleared, "room");
        let json: serde_json::Value = serde_json::from_str(&update.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "channel_update");
        assert_eq!(json["data"]["action"], "cleared");
        assert_eq!(json["data"]["channel"], "room");
    }
}
