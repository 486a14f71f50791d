//! Chat Message Data Structures
//!
//! Represents a message in a conversation together with its delivery
//! status. The status is a collective watermark over all recipients:
//! it only ever moves forward through `sent -> delivered -> read`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::models::user::UserSummary;

/// Delivery status of a message as perceived by all recipients collectively.
///
/// Ordered so that status comparisons express the monotonic watermark:
/// `Sent < Delivered < Read`. A status never regresses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// Persisted but no recipient connection was reachable yet
    Sent,
    /// At least one recipient connection was reachable
    Delivered,
    /// A recipient explicitly acknowledged reading it
    Read,
}

impl MessageStatus {
    /// Convert to string for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Read => "read",
        }
    }

    /// Parse from string (database)
    pub fn from_str(s: &str) -> Self {
        match s {
            "delivered" => MessageStatus::Delivered,
            "read" => MessageStatus::Read,
            _ => MessageStatus::Sent,
        }
    }

    /// Whether moving to `next` is a legal forward transition
    pub fn can_advance_to(&self, next: MessageStatus) -> bool {
        next > *self
    }
}

/// Type of message content
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Plain text message
    Text,
    /// Image attachment
    Image,
    /// Video attachment
    Video,
    /// Voice/audio attachment
    Audio,
    /// Generic file attachment
    File,
}

impl Default for MessageType {
    fn default() -> Self {
        MessageType::Text
    }
}

impl MessageType {
    /// Convert to string for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::Image => "image",
            MessageType::Video => "video",
            MessageType::Audio => "audio",
            MessageType::File => "file",
        }
    }

    /// Parse from string (database)
    pub fn from_str(s: &str) -> Self {
        match s {
            "image" => MessageType::Image,
            "video" => MessageType::Video,
            "audio" => MessageType::Audio,
            "file" => MessageType::File,
            _ => MessageType::Text,
        }
    }
}

/// Represents a persisted chat message.
///
/// Message ids are an i64 sequence rather than UUIDs: read watermarks
/// are expressed as "every message with id <= N", which needs a total
/// order over ids within a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    /// Unique message ID (monotonic sequence)
    pub id: i64,
    /// Conversation this message belongs to
    pub conversation_id: Uuid,
    /// User who sent the message
    pub sender_id: Uuid,
    /// Text content (empty for pure media messages)
    pub content: String,
    /// Content type
    pub message_type: MessageType,
    /// Media URL for non-text messages
    pub media_url: Option<String>,
    /// Original file name for file attachments
    pub media_name: Option<String>,
    /// Message this one replies to, if any
    pub reply_to_id: Option<i64>,
    /// Collective delivery status watermark
    pub status: MessageStatus,
    /// Deleted messages are frozen: no further status transitions apply
    pub is_deleted: bool,
    /// When the message was created
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Short body used for push notifications.
    ///
    /// Media messages render as an icon + label instead of raw content,
    /// so a push preview never leaks a media URL.
    pub fn push_preview(&self) -> String {
        match self.message_type {
            MessageType::Text => self.content.clone(),
            MessageType::Image => "\u{1F4F7} Photo".to_string(),
            MessageType::Video => "\u{1F3A5} Video".to_string(),
            MessageType::Audio => "\u{1F3A4} Voice message".to_string(),
            MessageType::File => {
                let name = self.media_name.as_deref().unwrap_or("File");
                format!("\u{1F4CE} {}", name)
            }
        }
    }
}

/// Short preview of the message a reply points at
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplyPreview {
    pub id: i64,
    pub sender_id: Uuid,
    pub content: String,
    pub message_type: MessageType,
}

/// A message joined with its sender profile and reply context,
/// as broadcast to conversation rooms.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageWithContext {
    #[serde(flatten)]
    pub message: ChatMessage,
    pub sender: UserSummary,
    pub reply_to: Option<ReplyPreview>,
}
