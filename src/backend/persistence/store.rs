//! Persistence collaborator abstraction
//!
//! The realtime core treats storage as a consistent, synchronously
//! awaited collaborator behind this trait. Two backends exist:
//!
//! - `PgStore` - PostgreSQL via sqlx, the production backend
//! - `MemoryStore` - in-process tables for development without a
//!   `DATABASE_URL` and for tests
//!
//! The core issues no multi-statement transactions of its own; every
//! operation here is an atomic unit from its point of view. Status
//! updates are forward-only at the storage layer too, so a racing
//! writer can never regress the `sent -> delivered -> read` watermark.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::backend::error::Result;
use crate::shared::models::{
    CallSession, CallStatus, CallType, ChatMessage, MessageType, MessageWithContext, UserSummary,
};

/// Payload for inserting a new message
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub message_type: MessageType,
    pub media_url: Option<String>,
    pub media_name: Option<String>,
    pub reply_to_id: Option<i64>,
}

/// Payload for inserting a new call session
#[derive(Debug, Clone)]
pub struct NewCall {
    pub caller_id: Uuid,
    pub callee_id: Uuid,
    pub call_type: CallType,
}

/// A conversation member, with the push token used when they are offline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub user_id: Uuid,
    pub push_token: Option<String>,
}

/// A message claimed for delivery on behalf of a connecting user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDelivery {
    pub message_id: i64,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
}

/// A message that advanced to `read` in a bulk read acknowledgment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadTransition {
    pub message_id: i64,
    pub sender_id: Uuid,
}

/// Persistence operations required by the realtime core
#[async_trait]
pub trait Store: Send + Sync {
    /// Persist a new message with status `sent` and return the full row
    async fn insert_message(&self, new: NewMessage) -> Result<ChatMessage>;

    /// Load a message joined with sender profile and reply context
    async fn get_message_with_context(&self, message_id: i64) -> Result<Option<MessageWithContext>>;

    /// Whether `user_id` currently participates in the conversation
    async fn is_conversation_participant(&self, conversation_id: Uuid, user_id: Uuid) -> Result<bool>;

    /// Compare-and-set claim of the `sent -> delivered` transition for
    /// one message. Returns whether this call flipped the row; a
    /// message already delivered, read, or deleted yields `false`.
    async fn mark_delivered(&self, message_id: i64) -> Result<bool>;

    /// Record a read receipt; idempotent per (message, reader) pair
    async fn upsert_read_receipt(&self, message_id: i64, user_id: Uuid) -> Result<()>;

    /// Advance the reader's per-conversation last-read watermark
    /// (never moves backwards)
    async fn advance_last_read_watermark(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        message_id: i64,
    ) -> Result<()>;

    /// Bulk-advance to `read` every non-deleted message in the
    /// conversation with id <= `up_to_message_id`, authored by someone
    /// other than `reader_id`, and not yet read. Returns the affected
    /// (message, sender) pairs.
    async fn mark_conversation_read(
        &self,
        conversation_id: Uuid,
        reader_id: Uuid,
        up_to_message_id: i64,
    ) -> Result<Vec<ReadTransition>>;

    /// All members of a conversation with their push tokens
    async fn list_participants(&self, conversation_id: Uuid) -> Result<Vec<Participant>>;

    /// Persist a user's online flag and last-seen timestamp
    async fn set_user_presence(&self, user_id: Uuid, is_online: bool, last_seen: DateTime<Utc>) -> Result<()>;

    /// Ids of every conversation the user belongs to (room snapshot)
    async fn get_user_conversation_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>>;

    /// Atomically claim every message still `sent` that is addressed
    /// to this user, flipping each to `delivered` in the same
    /// operation. A message appears in at most one claimer's result,
    /// so concurrent sweeps never double-report a delivery.
    async fn claim_pending_deliveries(&self, user_id: Uuid) -> Result<Vec<PendingDelivery>>;

    /// Public profile summary for a user
    async fn get_user(&self, user_id: Uuid) -> Result<Option<UserSummary>>;

    /// Create a call session in `ongoing` state
    async fn insert_call(&self, new: NewCall) -> Result<CallSession>;

    /// Load a call session
    async fn get_call(&self, call_id: Uuid) -> Result<Option<CallSession>>;

    /// Compare-and-set transition: moves the call from `from` to `to`
    /// and fills in answer/end timestamps and duration as appropriate.
    /// Returns `None` when the call is not currently in `from` (the
    /// transition guard failed), leaving the row untouched.
    async fn transition_call(
        &self,
        call_id: Uuid,
        from: CallStatus,
        to: CallStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<CallSession>>;
}
