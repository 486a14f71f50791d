//! Delivery State Machine
//!
//! Drives the `sent -> delivered -> read` lifecycle of messages. The
//! status is a collective watermark: it becomes `delivered` the moment
//! any one recipient's connection is reachable, and `read` only when a
//! specific recipient acknowledges. Per-recipient read receipts stay
//! the durable ground truth underneath the message-level watermark.
//!
//! Functions here mutate the store first and *return* the notifications
//! to emit; the caller sends them after its own acknowledgment. That
//! keeps the required ordering (persistence writes complete before any
//! notification fires, acks precede async status updates) in one
//! place, and a crash between write and notify self-heals on the next
//! connect's pending-delivery sweep.

use std::collections::HashMap;

use uuid::Uuid;

use crate::backend::error::Result;
use crate::backend::persistence::Store;
use crate::backend::presence::PresenceRegistry;
use crate::shared::events::MessageStatusUpdate;
use crate::shared::models::{ChatMessage, MessageStatus};

/// A status-update event addressed to one user's live connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusNotification {
    pub recipient: Uuid,
    pub update: MessageStatusUpdate,
}

/// Send-time `sent -> delivered` evaluation.
///
/// If any intended recipient resolves to a live presence entry the
/// message advances to `delivered` and the sender is owed one status
/// update. Zero reachable recipients (group of one, or everyone
/// offline) leaves the message `sent` and returns no notifications;
/// that is not an error.
pub async fn deliver_on_send(
    store: &dyn Store,
    presence: &PresenceRegistry,
    message: &ChatMessage,
) -> Result<Vec<StatusNotification>> {
    let participants = store.list_participants(message.conversation_id).await?;
    let any_recipient_online = participants
        .iter()
        .any(|p| p.user_id != message.sender_id && presence.is_online(p.user_id));

    if !any_recipient_online {
        return Ok(Vec::new());
    }

    // The flip is a compare-and-set; when a concurrent sweep claimed
    // the message first, that claimer already owes the notification
    if !store.mark_delivered(message.id).await? {
        return Ok(Vec::new());
    }

    Ok(vec![StatusNotification {
        recipient: message.sender_id,
        update: MessageStatusUpdate {
            message_id: message.id,
            conversation_id: message.conversation_id,
            status: MessageStatus::Delivered,
            read_by: None,
        },
    }])
}

/// Connect-time pending-delivery sweep.
///
/// Every message addressed to the newly connected user that is still
/// `sent` flips to `delivered`, and each message's original sender is
/// owed a status update. The claim is one atomic store operation, so
/// two recipients of the same message connecting at once produce one
/// sender notification between them, never two.
pub async fn sweep_pending(
    store: &dyn Store,
    user_id: Uuid,
) -> Result<Vec<StatusNotification>> {
    let claimed = store.claim_pending_deliveries(user_id).await?;

    Ok(claimed
        .into_iter()
        .map(|p| StatusNotification {
            recipient: p.sender_id,
            update: MessageStatusUpdate {
                message_id: p.message_id,
                conversation_id: p.conversation_id,
                status: MessageStatus::Delivered,
                read_by: None,
            },
        })
        .collect())
}

/// Read acknowledgment up to a watermark message id.
///
/// As one unit: upsert the read receipt, advance the reader's
/// last-read watermark, bulk-advance every qualifying message to
/// `read`, then produce one notification per distinct affected sender
/// (not per message), carrying the acknowledging user's identity and
/// the highest affected message id for that sender. The reader's own
/// messages never transition from their own read action.
pub async fn mark_read(
    store: &dyn Store,
    conversation_id: Uuid,
    reader_id: Uuid,
    up_to_message_id: i64,
) -> Result<Vec<StatusNotification>> {
    store.upsert_read_receipt(up_to_message_id, reader_id).await?;
    store
        .advance_last_read_watermark(conversation_id, reader_id, up_to_message_id)
        .await?;

    let affected = store
        .mark_conversation_read(conversation_id, reader_id, up_to_message_id)
        .await?;

    // One notification per distinct sender, deduplicated before dispatch
    let mut per_sender: HashMap<Uuid, i64> = HashMap::new();
    for transition in &affected {
        let entry = per_sender.entry(transition.sender_id).or_insert(transition.message_id);
        *entry = (*entry).max(transition.message_id);
    }

    let mut notifications: Vec<StatusNotification> = per_sender
        .into_iter()
        .map(|(sender_id, message_id)| StatusNotification {
            recipient: sender_id,
            update: MessageStatusUpdate {
                message_id,
                conversation_id,
                status: MessageStatus::Read,
                read_by: Some(reader_id),
            },
        })
        .collect();
    notifications.sort_by_key(|n| n.recipient);

    Ok(notifications)
}
