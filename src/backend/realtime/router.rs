//! Event Router
//!
//! Dispatches every inbound client event to its handler. Each handler
//! re-validates conversation membership against the store, so a user
//! removed from a conversation mid-session loses access on their very
//! next event even though their room subscription snapshot is stale.
//!
//! Handlers return an [`EventOutcome`]: the acknowledgment payload plus
//! the notifications to dispatch. The connection task sends the ack
//! first and performs the dispatches after, which keeps acks strictly
//! request/response while everything else stays fire-and-forget.

use serde_json::{json, Value};
use uuid::Uuid;

use crate::backend::calls::{self, signaling::SignalKind};
use crate::backend::delivery;
use crate::backend::error::{BackendError, Result};
use crate::backend::push::PushNotification;
use crate::backend::server::state::AppState;
use crate::shared::events::{
    CallInitiatePayload, CallRefPayload, ClientEvent, MarkReadPayload, SendMessagePayload,
    ServerEvent, SignalPayload, TypingPayload, UserTyping,
};
use crate::shared::models::MessageType;

/// A notification queued by a handler, performed after the ack
#[derive(Debug, Clone)]
pub enum Dispatch {
    /// Sent to one user's live connection; dropped if offline
    Direct { recipient: Uuid, event: ServerEvent },
    /// Fanned out to every subscriber of a conversation room
    Room { conversation_id: Uuid, event: ServerEvent },
}

/// Result of handling one event
#[derive(Debug, Default)]
pub struct EventOutcome {
    /// Payload echoed in the ack when the frame carried a `seq`
    pub data: Option<Value>,
    pub dispatches: Vec<Dispatch>,
}

impl EventOutcome {
    fn with_data(data: Value) -> Self {
        Self { data: Some(data), dispatches: Vec::new() }
    }
}

/// Route one event from an authenticated connection.
pub async fn handle_event(
    state: &AppState,
    user_id: Uuid,
    event: ClientEvent,
) -> Result<EventOutcome> {
    match event {
        ClientEvent::SendMessage(payload) => send_message(state, user_id, payload).await,
        ClientEvent::Typing(payload) => typing(state, user_id, payload).await,
        ClientEvent::MarkRead(payload) => mark_read(state, user_id, payload).await,
        ClientEvent::CallInitiate(payload) => call_initiate(state, user_id, payload).await,
        ClientEvent::CallAnswer(payload) => {
            let outcome = calls::answer(state.store.as_ref(), user_id, payload.call_id).await?;
            Ok(call_outcome(outcome)?)
        }
        ClientEvent::CallReject(payload) => {
            let outcome = calls::reject(state.store.as_ref(), user_id, payload.call_id).await?;
            Ok(call_outcome(outcome)?)
        }
        ClientEvent::CallEnd(payload) => call_end(state, user_id, payload).await,
        ClientEvent::CallMissed(payload) => {
            let outcome = calls::missed(state.store.as_ref(), user_id, payload.call_id).await?;
            Ok(call_outcome(outcome)?)
        }
        ClientEvent::WebrtcOffer(payload) => relay(user_id, SignalKind::Offer, payload),
        ClientEvent::WebrtcAnswer(payload) => relay(user_id, SignalKind::Answer, payload),
        ClientEvent::WebrtcIceCandidate(payload) => {
            relay(user_id, SignalKind::IceCandidate, payload)
        }
        ClientEvent::GetOnlineUsers => get_online_users(state).await,
    }
}

/// Perform the dispatches a handler queued.
pub fn perform_dispatches(state: &AppState, dispatches: Vec<Dispatch>) {
    for dispatch in dispatches {
        match dispatch {
            Dispatch::Direct { recipient, event } => {
                state.presence.send_to(recipient, event);
            }
            Dispatch::Room { conversation_id, event } => {
                state.rooms.broadcast(conversation_id, event);
            }
        }
    }
}

async fn send_message(
    state: &AppState,
    user_id: Uuid,
    payload: SendMessagePayload,
) -> Result<EventOutcome> {
    // Payload shape is checked before the store is touched at all
    if payload.content.trim().is_empty() && payload.media_url.is_none() {
        return Err(BackendError::validation("content", "message has no content"));
    }
    if payload.message_type != MessageType::Text && payload.media_url.is_none() {
        return Err(BackendError::validation("media_url", "media messages need a media_url"));
    }

    require_participant(state, payload.conversation_id, user_id).await?;

    let message = state
        .store
        .insert_message(crate::backend::persistence::NewMessage {
            conversation_id: payload.conversation_id,
            sender_id: user_id,
            content: payload.content,
            message_type: payload.message_type,
            media_url: payload.media_url,
            media_name: payload.media_name,
            reply_to_id: payload.reply_to_id,
        })
        .await?;

    tracing::debug!(message_id = message.id, conversation = %message.conversation_id, "Message persisted");

    let mut dispatches = Vec::new();
    for n in delivery::deliver_on_send(state.store.as_ref(), &state.presence, &message).await? {
        dispatches.push(Dispatch::Direct { recipient: n.recipient, event: ServerEvent::MessageStatusUpdate(n.update) });
    }

    // Re-fetch so the broadcast copy carries the post-delivery status
    let context = state
        .store
        .get_message_with_context(message.id)
        .await?
        .ok_or_else(|| BackendError::not_found("Message vanished after insert"))?;

    dispatches.push(Dispatch::Room {
        conversation_id: context.message.conversation_id,
        event: ServerEvent::NewMessage(context.clone()),
    });

    queue_offline_pushes(state, &context).await?;

    Ok(EventOutcome {
        data: Some(serde_json::to_value(&context)?),
        dispatches,
    })
}

/// Push a preview to every participant who is offline but has a
/// registered device token. Queued only; failures never reach the ack.
async fn queue_offline_pushes(
    state: &AppState,
    context: &crate::shared::models::MessageWithContext,
) -> Result<()> {
    let message = &context.message;
    let participants = state.store.list_participants(message.conversation_id).await?;
    for participant in participants {
        if participant.user_id == message.sender_id || state.presence.is_online(participant.user_id) {
            continue;
        }
        let Some(token) = participant.push_token else { continue };
        state.push.dispatch(PushNotification {
            token,
            title: context.sender.display_label().to_string(),
            body: message.push_preview(),
            data: json!({
                "conversation_id": message.conversation_id,
                "message_id": message.id,
            }),
        });
    }
    Ok(())
}

async fn typing(state: &AppState, user_id: Uuid, payload: TypingPayload) -> Result<EventOutcome> {
    require_participant(state, payload.conversation_id, user_id).await?;

    Ok(EventOutcome {
        data: None,
        dispatches: vec![Dispatch::Room {
            conversation_id: payload.conversation_id,
            event: ServerEvent::UserTyping(UserTyping {
                conversation_id: payload.conversation_id,
                user_id,
                is_typing: payload.is_typing,
            }),
        }],
    })
}

async fn mark_read(
    state: &AppState,
    user_id: Uuid,
    payload: MarkReadPayload,
) -> Result<EventOutcome> {
    require_participant(state, payload.conversation_id, user_id).await?;

    let notifications = delivery::mark_read(
        state.store.as_ref(),
        payload.conversation_id,
        user_id,
        payload.up_to_message_id,
    )
    .await?;

    let senders_notified = notifications.len();
    let dispatches = notifications
        .into_iter()
        .map(|n| Dispatch::Direct {
            recipient: n.recipient,
            event: ServerEvent::MessageStatusUpdate(n.update),
        })
        .collect();

    Ok(EventOutcome {
        data: Some(json!({
            "up_to_message_id": payload.up_to_message_id,
            "senders_notified": senders_notified,
        })),
        dispatches,
    })
}

async fn call_initiate(
    state: &AppState,
    user_id: Uuid,
    payload: CallInitiatePayload,
) -> Result<EventOutcome> {
    let outcome = calls::initiate(
        state.store.as_ref(),
        user_id,
        payload.callee_id,
        payload.call_type,
    )
    .await?;
    call_outcome(outcome)
}

async fn call_end(
    state: &AppState,
    user_id: Uuid,
    payload: CallRefPayload,
) -> Result<EventOutcome> {
    let outcome = calls::end(state.store.as_ref(), user_id, payload.call_id).await?;
    call_outcome(outcome)
}

fn call_outcome(outcome: calls::CallOutcome) -> Result<EventOutcome> {
    let mut dispatches = Vec::new();
    if let Some(n) = outcome.notification {
        dispatches.push(Dispatch::Direct { recipient: n.recipient, event: n.event });
    }
    Ok(EventOutcome {
        data: Some(serde_json::to_value(&outcome.call)?),
        dispatches,
    })
}

fn relay(user_id: Uuid, kind: SignalKind, payload: SignalPayload) -> Result<EventOutcome> {
    Ok(EventOutcome {
        data: None,
        dispatches: vec![Dispatch::Direct {
            recipient: payload.to_user_id,
            event: calls::signaling::relay_event(kind, user_id, payload.payload),
        }],
    })
}

async fn get_online_users(state: &AppState) -> Result<EventOutcome> {
    // Ids come from the registry; profiles are joined from the store so
    // clients get display names without a second round trip.
    let mut users = Vec::new();
    for user_id in state.presence.snapshot_user_ids() {
        if let Some(summary) = state.store.get_user(user_id).await? {
            users.push(summary);
        }
    }
    Ok(EventOutcome::with_data(json!({ "users": users })))
}

async fn require_participant(state: &AppState, conversation_id: Uuid, user_id: Uuid) -> Result<()> {
    if state
        .store
        .is_conversation_participant(conversation_id, user_id)
        .await?
    {
        Ok(())
    } else {
        Err(BackendError::forbidden("Not a participant in this conversation"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Utc;
    use tokio::sync::mpsc;

    use crate::backend::persistence::MemoryStore;
    use crate::backend::presence::{ConnectionHandle, PresenceRegistry};
    use crate::backend::push::{PushDispatcher, RecordingPush};
    use crate::backend::realtime::rooms::RoomBroadcasts;
    use crate::shared::models::{MessageStatus, UserSummary};

    struct Harness {
        state: AppState,
        store: Arc<MemoryStore>,
        push_sink: Arc<RecordingPush>,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let push_sink = Arc::new(RecordingPush::new());
        let state = AppState {
            store: store.clone(),
            presence: Arc::new(PresenceRegistry::new()),
            rooms: RoomBroadcasts::new(),
            push: PushDispatcher::spawn(push_sink.clone()),
        };
        Harness { state, store, push_sink }
    }

    fn seed_user(store: &MemoryStore, token: Option<&str>) -> Uuid {
        let id = Uuid::new_v4();
        store.upsert_user(
            UserSummary {
                id,
                username: format!("user-{}", &id.to_string()[..8]),
                display_name: None,
                avatar_url: None,
                is_online: false,
                last_seen: Utc::now(),
            },
            token.map(String::from),
        );
        id
    }

    fn connect(state: &AppState, user_id: Uuid) -> mpsc::UnboundedReceiver<ServerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        state.presence.register(ConnectionHandle::new(user_id, tx));
        rx
    }

    fn send_payload(conversation_id: Uuid, content: &str) -> SendMessagePayload {
        SendMessagePayload {
            conversation_id,
            content: content.to_string(),
            message_type: MessageType::Text,
            media_url: None,
            media_name: None,
            reply_to_id: None,
        }
    }

    #[tokio::test]
    async fn test_send_message_requires_membership() {
        let h = harness();
        let outsider = seed_user(&h.store, None);
        let (a, b) = (seed_user(&h.store, None), seed_user(&h.store, None));
        let conv = h.store.create_conversation(&[a, b]);

        let err = handle_event(
            &h.state,
            outsider,
            ClientEvent::SendMessage(send_payload(conv, "let me in")),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, BackendError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn test_send_message_acks_with_full_context() {
        let h = harness();
        let (a, b) = (seed_user(&h.store, None), seed_user(&h.store, None));
        let conv = h.store.create_conversation(&[a, b]);

        let outcome = handle_event(
            &h.state,
            a,
            ClientEvent::SendMessage(send_payload(conv, "hello")),
        )
        .await
        .unwrap();

        let data = outcome.data.unwrap();
        assert_eq!(data["content"], "hello");
        assert_eq!(data["status"], "sent");
        assert_eq!(data["sender"]["id"], json!(a));
        assert!(outcome
            .dispatches
            .iter()
            .any(|d| matches!(d, Dispatch::Room { conversation_id, .. } if *conversation_id == conv)));
    }

    #[tokio::test]
    async fn test_send_message_with_online_recipient_queues_sender_update() {
        let h = harness();
        let (a, b) = (seed_user(&h.store, None), seed_user(&h.store, None));
        let conv = h.store.create_conversation(&[a, b]);
        let _rx_b = connect(&h.state, b);

        let outcome = handle_event(
            &h.state,
            a,
            ClientEvent::SendMessage(send_payload(conv, "hello")),
        )
        .await
        .unwrap();

        // Ack and broadcast both reflect the delivered status
        assert_eq!(outcome.data.unwrap()["status"], "delivered");
        let direct = outcome
            .dispatches
            .iter()
            .find_map(|d| match d {
                Dispatch::Direct { recipient, event: ServerEvent::MessageStatusUpdate(u) } => {
                    Some((*recipient, u.clone()))
                }
                _ => None,
            })
            .unwrap();
        assert_eq!(direct.0, a);
        assert_eq!(direct.1.status, MessageStatus::Delivered);
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected_before_persistence() {
        let h = harness();
        let (a, b) = (seed_user(&h.store, None), seed_user(&h.store, None));
        let conv = h.store.create_conversation(&[a, b]);

        let err = handle_event(
            &h.state,
            a,
            ClientEvent::SendMessage(send_payload(conv, "   ")),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, BackendError::Validation(_)));
        assert!(h.store.message(1).is_none());
    }

    #[tokio::test]
    async fn test_payload_validation_precedes_membership_check() {
        let h = harness();
        let outsider = seed_user(&h.store, None);

        // An empty payload from a non-participant fails as validation,
        // showing no store lookup happened first
        let err = handle_event(
            &h.state,
            outsider,
            ClientEvent::SendMessage(send_payload(Uuid::new_v4(), "   ")),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, BackendError::Validation(_)));
    }

    #[tokio::test]
    async fn test_offline_recipient_with_token_gets_push_preview() {
        let h = harness();
        let (a, b) = (seed_user(&h.store, None), seed_user(&h.store, Some("tok-b")));
        let conv = h.store.create_conversation(&[a, b]);

        let payload = SendMessagePayload {
            conversation_id: conv,
            content: String::new(),
            message_type: MessageType::Image,
            media_url: Some("https://cdn.example/img.png".to_string()),
            media_name: None,
            reply_to_id: None,
        };
        handle_event(&h.state, a, ClientEvent::SendMessage(payload))
            .await
            .unwrap();

        // Let the dispatch worker drain the queue
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let sent = h.push_sink.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].token, "tok-b");
        // Media bodies never leak the URL
        assert!(!sent[0].body.contains("cdn.example"));
        assert!(sent[0].body.contains("Photo"));
    }

    #[tokio::test]
    async fn test_typing_broadcasts_without_persistence() {
        let h = harness();
        let (a, b) = (seed_user(&h.store, None), seed_user(&h.store, None));
        let conv = h.store.create_conversation(&[a, b]);

        let outcome = handle_event(
            &h.state,
            a,
            ClientEvent::Typing(TypingPayload { conversation_id: conv, is_typing: true }),
        )
        .await
        .unwrap();

        assert!(outcome.data.is_none());
        match &outcome.dispatches[..] {
            [Dispatch::Room { conversation_id, event: ServerEvent::UserTyping(t) }] => {
                assert_eq!(*conversation_id, conv);
                assert_eq!(t.user_id, a);
                assert!(t.is_typing);
            }
            other => panic!("unexpected dispatches: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_mark_read_notifies_each_sender_once() {
        let h = harness();
        let (a, b) = (seed_user(&h.store, None), seed_user(&h.store, None));
        let conv = h.store.create_conversation(&[a, b]);

        for text in ["one", "two", "three"] {
            handle_event(&h.state, a, ClientEvent::SendMessage(send_payload(conv, text)))
                .await
                .unwrap();
        }

        let outcome = handle_event(
            &h.state,
            b,
            ClientEvent::MarkRead(MarkReadPayload { conversation_id: conv, up_to_message_id: 3 }),
        )
        .await
        .unwrap();

        assert_eq!(outcome.data.unwrap()["senders_notified"], 1);
        let updates: Vec<_> = outcome
            .dispatches
            .iter()
            .filter_map(|d| match d {
                Dispatch::Direct { recipient, event: ServerEvent::MessageStatusUpdate(u) } => {
                    Some((*recipient, u.clone()))
                }
                _ => None,
            })
            .collect();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].0, a);
        assert_eq!(updates[0].1.read_by, Some(b));
        assert_eq!(updates[0].1.message_id, 3);
    }

    #[tokio::test]
    async fn test_webrtc_relay_targets_named_peer() {
        let h = harness();
        let (a, b) = (seed_user(&h.store, None), seed_user(&h.store, None));

        let outcome = handle_event(
            &h.state,
            a,
            ClientEvent::WebrtcOffer(SignalPayload {
                to_user_id: b,
                payload: json!({"sdp": "v=0"}),
            }),
        )
        .await
        .unwrap();

        match &outcome.dispatches[..] {
            [Dispatch::Direct { recipient, event: ServerEvent::WebrtcOffer(relay) }] => {
                assert_eq!(*recipient, b);
                assert_eq!(relay.sender_id, a);
            }
            other => panic!("unexpected dispatches: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_online_users_reflects_registry() {
        let h = harness();
        let (a, b) = (seed_user(&h.store, None), seed_user(&h.store, None));
        let _rx_a = connect(&h.state, a);
        let _rx_b = connect(&h.state, b);

        let outcome = handle_event(&h.state, a, ClientEvent::GetOnlineUsers).await.unwrap();
        let users = outcome.data.unwrap();
        let users = users["users"].as_array().unwrap().clone();
        assert_eq!(users.len(), 2);
        assert!(users.iter().all(|u| u["username"].is_string()));
    }

    #[tokio::test]
    async fn test_call_flow_through_router() {
        let h = harness();
        let (caller, callee) = (seed_user(&h.store, None), seed_user(&h.store, None));

        let outcome = handle_event(
            &h.state,
            caller,
            ClientEvent::CallInitiate(CallInitiatePayload {
                callee_id: callee,
                call_type: crate::shared::models::CallType::Audio,
            }),
        )
        .await
        .unwrap();
        let call_id: Uuid =
            serde_json::from_value(outcome.data.unwrap()["id"].clone()).unwrap();

        let answered = handle_event(
            &h.state,
            callee,
            ClientEvent::CallAnswer(CallRefPayload { call_id }),
        )
        .await
        .unwrap();
        assert_eq!(answered.data.unwrap()["status"], "answered");

        // Caller intrusion on a callee-only transition surfaces as an error
        let err = handle_event(
            &h.state,
            caller,
            ClientEvent::CallReject(CallRefPayload { call_id }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, BackendError::Forbidden { .. }));
    }
}
