//! In-memory persistence backend
//!
//! Mutex-guarded tables implementing the same contract as `PgStore`.
//! Used when the server starts without a `DATABASE_URL` and as the
//! backend for the integration test suites. Nothing here survives a
//! restart.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::backend::error::Result;
use crate::backend::persistence::store::{
    NewCall, NewMessage, Participant, PendingDelivery, ReadTransition, Store,
};
use crate::shared::models::{
    CallSession, CallStatus, ChatMessage, MessageStatus, MessageWithContext, ReplyPreview,
    UserSummary,
};

#[derive(Debug, Clone)]
struct UserRecord {
    summary: UserSummary,
    push_token: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct ConversationRecord {
    /// participant -> last-read watermark
    members: HashMap<Uuid, i64>,
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, UserRecord>,
    conversations: HashMap<Uuid, ConversationRecord>,
    messages: BTreeMap<i64, ChatMessage>,
    receipts: HashSet<(i64, Uuid)>,
    calls: HashMap<Uuid, CallSession>,
    next_message_id: i64,
}

/// In-process store backend
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a user record (fixture/seeding helper)
    pub fn upsert_user(&self, summary: UserSummary, push_token: Option<String>) {
        let mut inner = self.inner.lock().unwrap();
        inner.users.insert(summary.id, UserRecord { summary, push_token });
    }

    /// Create a conversation with the given members (fixture/seeding helper)
    pub fn create_conversation(&self, members: &[Uuid]) -> Uuid {
        let id = Uuid::new_v4();
        let mut inner = self.inner.lock().unwrap();
        let record = ConversationRecord {
            members: members.iter().map(|m| (*m, 0)).collect(),
            updated_at: None,
        };
        inner.conversations.insert(id, record);
        id
    }

    /// Snapshot a single message row (test inspection helper)
    pub fn message(&self, message_id: i64) -> Option<ChatMessage> {
        self.inner.lock().unwrap().messages.get(&message_id).cloned()
    }

    /// Whether a read receipt exists for (message, reader)
    pub fn has_read_receipt(&self, message_id: i64, user_id: Uuid) -> bool {
        self.inner.lock().unwrap().receipts.contains(&(message_id, user_id))
    }

    /// The reader's last-read watermark in a conversation
    pub fn last_read_watermark(&self, conversation_id: Uuid, user_id: Uuid) -> Option<i64> {
        self.inner
            .lock()
            .unwrap()
            .conversations
            .get(&conversation_id)
            .and_then(|c| c.members.get(&user_id).copied())
    }

    /// Flag a message deleted (test helper; deletion itself is a CRUD
    /// concern outside the realtime core)
    pub fn set_deleted(&self, message_id: i64) {
        if let Some(msg) = self.inner.lock().unwrap().messages.get_mut(&message_id) {
            msg.is_deleted = true;
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_message(&self, new: NewMessage) -> Result<ChatMessage> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_message_id += 1;
        let id = inner.next_message_id;
        let now = Utc::now();

        let message = ChatMessage {
            id,
            conversation_id: new.conversation_id,
            sender_id: new.sender_id,
            content: new.content,
            message_type: new.message_type,
            media_url: new.media_url,
            media_name: new.media_name,
            reply_to_id: new.reply_to_id,
            status: MessageStatus::Sent,
            is_deleted: false,
            created_at: now,
        };
        inner.messages.insert(id, message.clone());
        if let Some(conversation) = inner.conversations.get_mut(&new.conversation_id) {
            conversation.updated_at = Some(now);
        }

        Ok(message)
    }

    async fn get_message_with_context(&self, message_id: i64) -> Result<Option<MessageWithContext>> {
        let inner = self.inner.lock().unwrap();
        let Some(message) = inner.messages.get(&message_id).cloned() else {
            return Ok(None);
        };
        let Some(sender) = inner.users.get(&message.sender_id) else {
            return Ok(None);
        };
        let reply_to = message
            .reply_to_id
            .and_then(|reply_id| inner.messages.get(&reply_id))
            .map(|reply| ReplyPreview {
                id: reply.id,
                sender_id: reply.sender_id,
                content: reply.content.clone(),
                message_type: reply.message_type,
            });

        Ok(Some(MessageWithContext {
            message,
            sender: sender.summary.clone(),
            reply_to,
        }))
    }

    async fn is_conversation_participant(&self, conversation_id: Uuid, user_id: Uuid) -> Result<bool> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .conversations
            .get(&conversation_id)
            .map(|c| c.members.contains_key(&user_id))
            .unwrap_or(false))
    }

    async fn mark_delivered(&self, message_id: i64) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        match inner.messages.get_mut(&message_id) {
            Some(msg) if !msg.is_deleted && msg.status.can_advance_to(MessageStatus::Delivered) => {
                msg.status = MessageStatus::Delivered;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn upsert_read_receipt(&self, message_id: i64, user_id: Uuid) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        // Receipts for unknown message ids are ignored, same as the
        // existence guard in the Postgres backend
        if inner.messages.contains_key(&message_id) {
            inner.receipts.insert((message_id, user_id));
        }
        Ok(())
    }

    async fn advance_last_read_watermark(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        message_id: i64,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(conversation) = inner.conversations.get_mut(&conversation_id) {
            if let Some(watermark) = conversation.members.get_mut(&user_id) {
                *watermark = (*watermark).max(message_id);
            }
        }
        Ok(())
    }

    async fn mark_conversation_read(
        &self,
        conversation_id: Uuid,
        reader_id: Uuid,
        up_to_message_id: i64,
    ) -> Result<Vec<ReadTransition>> {
        let mut inner = self.inner.lock().unwrap();
        let mut affected = Vec::new();
        for (id, msg) in inner.messages.range_mut(..=up_to_message_id) {
            if msg.conversation_id == conversation_id
                && msg.sender_id != reader_id
                && msg.status != MessageStatus::Read
                && !msg.is_deleted
            {
                msg.status = MessageStatus::Read;
                affected.push(ReadTransition {
                    message_id: *id,
                    sender_id: msg.sender_id,
                });
            }
        }
        Ok(affected)
    }

    async fn list_participants(&self, conversation_id: Uuid) -> Result<Vec<Participant>> {
        let inner = self.inner.lock().unwrap();
        let Some(conversation) = inner.conversations.get(&conversation_id) else {
            return Ok(Vec::new());
        };
        Ok(conversation
            .members
            .keys()
            .map(|user_id| Participant {
                user_id: *user_id,
                push_token: inner.users.get(user_id).and_then(|u| u.push_token.clone()),
            })
            .collect())
    }

    async fn set_user_presence(&self, user_id: Uuid, is_online: bool, last_seen: DateTime<Utc>) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(user) = inner.users.get_mut(&user_id) {
            user.summary.is_online = is_online;
            user.summary.last_seen = last_seen;
        }
        Ok(())
    }

    async fn get_user_conversation_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .conversations
            .iter()
            .filter(|(_, c)| c.members.contains_key(&user_id))
            .map(|(id, _)| *id)
            .collect())
    }

    async fn claim_pending_deliveries(&self, user_id: Uuid) -> Result<Vec<PendingDelivery>> {
        let mut inner = self.inner.lock().unwrap();
        let Inner { conversations, messages, .. } = &mut *inner;

        // Flipping under the same lock as the scan makes the claim
        // atomic: a message lands in exactly one claimer's result
        let mut claimed = Vec::new();
        for msg in messages.values_mut() {
            if msg.status == MessageStatus::Sent
                && !msg.is_deleted
                && msg.sender_id != user_id
                && conversations
                    .get(&msg.conversation_id)
                    .map(|c| c.members.contains_key(&user_id))
                    .unwrap_or(false)
            {
                msg.status = MessageStatus::Delivered;
                claimed.push(PendingDelivery {
                    message_id: msg.id,
                    conversation_id: msg.conversation_id,
                    sender_id: msg.sender_id,
                });
            }
        }
        Ok(claimed)
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<UserSummary>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.get(&user_id).map(|u| u.summary.clone()))
    }

    async fn insert_call(&self, new: NewCall) -> Result<CallSession> {
        let mut inner = self.inner.lock().unwrap();
        let call = CallSession {
            id: Uuid::new_v4(),
            caller_id: new.caller_id,
            callee_id: new.callee_id,
            call_type: new.call_type,
            status: CallStatus::Ongoing,
            started_at: Utc::now(),
            answered_at: None,
            ended_at: None,
            duration_seconds: 0,
        };
        inner.calls.insert(call.id, call.clone());
        Ok(call)
    }

    async fn get_call(&self, call_id: Uuid) -> Result<Option<CallSession>> {
        Ok(self.inner.lock().unwrap().calls.get(&call_id).cloned())
    }

    async fn transition_call(
        &self,
        call_id: Uuid,
        from: CallStatus,
        to: CallStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<CallSession>> {
        let mut inner = self.inner.lock().unwrap();
        let Some(call) = inner.calls.get_mut(&call_id) else {
            return Ok(None);
        };
        if call.status != from {
            return Ok(None);
        }

        call.status = to;
        match to {
            CallStatus::Answered => call.answered_at = Some(at),
            CallStatus::Ended | CallStatus::Rejected | CallStatus::Missed => {
                call.ended_at = Some(at);
                if to == CallStatus::Ended && from == CallStatus::Answered {
                    if let Some(answered_at) = call.answered_at {
                        call.duration_seconds = (at - answered_at).num_seconds().max(0);
                    }
                }
            }
            CallStatus::Ongoing => {}
        }

        Ok(Some(call.clone()))
    }
}
