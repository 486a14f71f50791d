//! Realtime Wire Protocol
//!
//! Event types exchanged over the WebSocket connection. Inbound frames
//! carry an event name, an optional `seq` for acknowledgment pairing,
//! and an event-specific payload:
//!
//! ```json
//! {"event": "send_message", "seq": 7, "data": {"conversation_id": "...", "content": "hi"}}
//! ```
//!
//! Events that carry a `seq` are answered with an `ack` frame:
//!
//! ```json
//! {"event": "ack", "data": {"seq": 7, "success": true, "data": {...}}}
//! ```
//!
//! Signaling passthroughs and typing indicators are best-effort; they
//! are only acked when the client asked for it by sending a `seq`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::shared::models::{
    CallSession, CallType, MessageStatus, MessageType, MessageWithContext, UserSummary,
};

/// Events a client can send over the socket
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    SendMessage(SendMessagePayload),
    Typing(TypingPayload),
    MarkRead(MarkReadPayload),
    CallInitiate(CallInitiatePayload),
    CallAnswer(CallRefPayload),
    CallReject(CallRefPayload),
    CallEnd(CallRefPayload),
    /// Callee-side notice that a ringing call was never picked up
    CallMissed(CallRefPayload),
    WebrtcOffer(SignalPayload),
    WebrtcAnswer(SignalPayload),
    WebrtcIceCandidate(SignalPayload),
    GetOnlineUsers,
}

/// An inbound frame: event plus optional acknowledgment sequence number
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientFrame {
    #[serde(flatten)]
    pub event: ClientEvent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SendMessagePayload {
    pub conversation_id: Uuid,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub message_type: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TypingPayload {
    pub conversation_id: Uuid,
    pub is_typing: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MarkReadPayload {
    pub conversation_id: Uuid,
    /// Read watermark: every own-received message with id <= this is read
    pub up_to_message_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallInitiatePayload {
    pub callee_id: Uuid,
    pub call_type: CallType,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallRefPayload {
    pub call_id: Uuid,
}

/// WebRTC handshake passthrough addressed to one peer.
/// The payload (SDP or ICE candidate) is opaque to the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignalPayload {
    pub to_user_id: Uuid,
    pub payload: Value,
}

/// Events the server pushes to clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    Ack(EventAck),
    NewMessage(MessageWithContext),
    MessageStatusUpdate(MessageStatusUpdate),
    UserTyping(UserTyping),
    IncomingCall(IncomingCall),
    CallAnswered(CallRefPayload),
    CallRejected(CallRefPayload),
    CallEnded(CallEnded),
    CallMissed(CallRefPayload),
    WebrtcOffer(SignalRelay),
    WebrtcAnswer(SignalRelay),
    WebrtcIceCandidate(SignalRelay),
    UserOffline(UserOffline),
}

impl ServerEvent {
    /// User a room broadcast of this event must skip, if any.
    ///
    /// Typing indicators are about a user; that user's own connection
    /// never needs the echo.
    pub fn excluded_user(&self) -> Option<Uuid> {
        match self {
            ServerEvent::UserTyping(t) => Some(t.user_id),
            _ => None,
        }
    }
}

/// Acknowledgment for an inbound event that carried a `seq`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventAck {
    pub seq: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<AckError>,
}

impl EventAck {
    pub fn ok(seq: u64, data: Option<Value>) -> Self {
        Self { seq, success: true, data, error: None }
    }

    pub fn err(seq: u64, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            seq,
            success: false,
            data: None,
            error: Some(AckError { code: code.into(), message: message.into() }),
        }
    }
}

/// Machine-readable ack failure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AckError {
    pub code: String,
    pub message: String,
}

/// Status watermark change on a message, sent to the original sender.
/// `read_by` is set only for `read` transitions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageStatusUpdate {
    pub message_id: i64,
    pub conversation_id: Uuid,
    pub status: MessageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_by: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserTyping {
    pub conversation_id: Uuid,
    pub user_id: Uuid,
    pub is_typing: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IncomingCall {
    pub call: CallSession,
    pub caller: UserSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallEnded {
    pub call_id: Uuid,
    pub duration_seconds: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignalRelay {
    pub sender_id: Uuid,
    pub payload: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserOffline {
    pub user_id: Uuid,
    pub last_seen: chrono::DateTime<chrono::Utc>,
}
