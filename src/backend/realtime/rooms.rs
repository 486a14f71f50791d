//! Conversation room broadcasts
//!
//! Each conversation gets its own `tokio::sync::broadcast` channel so
//! events for one room never cross-talk into another. Connections
//! subscribe at connect time to the rooms in their membership
//! snapshot; channels with no remaining subscribers are reaped
//! periodically.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::shared::events::ServerEvent;

/// Per-room channel capacity. A slow consumer past this many queued
/// events starts lagging and misses broadcasts (acceptable: broadcasts
/// are best-effort, durable state lives in the store).
const ROOM_CAPACITY: usize = 256;

/// Broadcast channels for conversation rooms
#[derive(Clone, Default)]
pub struct RoomBroadcasts {
    channels: Arc<Mutex<HashMap<Uuid, broadcast::Sender<ServerEvent>>>>,
}

impl RoomBroadcasts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the broadcast sender for a conversation
    pub fn get_sender(&self, conversation_id: Uuid) -> broadcast::Sender<ServerEvent> {
        let mut channels = self.channels.lock().unwrap();
        channels
            .entry(conversation_id)
            .or_insert_with(|| broadcast::channel(ROOM_CAPACITY).0)
            .clone()
    }

    /// Broadcast an event to every subscriber of a conversation room.
    /// No subscribers is not an error.
    pub fn broadcast(&self, conversation_id: Uuid, event: ServerEvent) {
        if let Some(sender) = self.channels.lock().unwrap().get(&conversation_id) {
            let _ = sender.send(event);
        }
    }

    /// Drop channels with no live subscribers
    pub fn cleanup_inactive_channels(&self) {
        self.channels
            .lock()
            .unwrap()
            .retain(|_, sender| sender.receiver_count() > 0);
    }

    /// Subscriber count for a conversation (diagnostics)
    pub fn subscriber_count(&self, conversation_id: Uuid) -> usize {
        self.channels
            .lock()
            .unwrap()
            .get(&conversation_id)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::events::{EventAck, UserTyping};

    #[tokio::test]
    async fn test_broadcast_reaches_subscribers() {
        let rooms = RoomBroadcasts::new();
        let conv = Uuid::new_v4();
        let mut rx = rooms.get_sender(conv).subscribe();

        rooms.broadcast(conv, ServerEvent::Ack(EventAck::ok(1, None)));
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, ServerEvent::Ack(_)));
    }

    #[tokio::test]
    async fn test_rooms_are_isolated() {
        let rooms = RoomBroadcasts::new();
        let (conv_a, conv_b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut rx_a = rooms.get_sender(conv_a).subscribe();
        let _sender_b = rooms.get_sender(conv_b);

        rooms.broadcast(
            conv_b,
            ServerEvent::UserTyping(UserTyping {
                conversation_id: conv_b,
                user_id: Uuid::new_v4(),
                is_typing: true,
            }),
        );
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_to_unknown_room_is_noop() {
        let rooms = RoomBroadcasts::new();
        rooms.broadcast(Uuid::new_v4(), ServerEvent::Ack(EventAck::ok(1, None)));
    }

    #[tokio::test]
    async fn test_cleanup_reaps_empty_channels() {
        let rooms = RoomBroadcasts::new();
        let conv = Uuid::new_v4();
        {
            let _rx = rooms.get_sender(conv).subscribe();
            assert_eq!(rooms.subscriber_count(conv), 1);
        }
        rooms.cleanup_inactive_channels();
        assert_eq!(rooms.subscriber_count(conv), 0);
    }
}
