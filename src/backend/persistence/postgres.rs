//! PostgreSQL persistence backend
//!
//! sqlx-based implementation of the `Store` trait. Schema lives in
//! `migrations/`; every query is a parameterized statement mapped by
//! hand from rows, matching the rest of the storage layer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::backend::error::Result;
use crate::backend::persistence::store::{
    NewCall, NewMessage, Participant, PendingDelivery, ReadTransition, Store,
};
use crate::shared::models::{
    CallSession, CallStatus, CallType, ChatMessage, MessageStatus, MessageType,
    MessageWithContext, ReplyPreview, UserSummary,
};

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn message_from_row(row: &sqlx::postgres::PgRow) -> ChatMessage {
    let message_type: String = row.get("message_type");
    let status: String = row.get("status");
    ChatMessage {
        id: row.get("id"),
        conversation_id: row.get("conversation_id"),
        sender_id: row.get("sender_id"),
        content: row.get("content"),
        message_type: MessageType::from_str(&message_type),
        media_url: row.get("media_url"),
        media_name: row.get("media_name"),
        reply_to_id: row.get("reply_to_id"),
        status: MessageStatus::from_str(&status),
        is_deleted: row.get("is_deleted"),
        created_at: row.get("created_at"),
    }
}

fn call_from_row(row: &sqlx::postgres::PgRow) -> CallSession {
    let call_type: String = row.get("call_type");
    let status: String = row.get("status");
    CallSession {
        id: row.get("id"),
        caller_id: row.get("caller_id"),
        callee_id: row.get("callee_id"),
        call_type: CallType::from_str(&call_type),
        status: CallStatus::from_str(&status),
        started_at: row.get("started_at"),
        answered_at: row.get("answered_at"),
        ended_at: row.get("ended_at"),
        duration_seconds: row.get("duration_seconds"),
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert_message(&self, new: NewMessage) -> Result<ChatMessage> {
        let now = Utc::now();

        let row = sqlx::query(
            r#"
            INSERT INTO messages (conversation_id, sender_id, content, message_type, media_url, media_name, reply_to_id, status, is_deleted, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'sent', FALSE, $8)
            RETURNING id, conversation_id, sender_id, content, message_type, media_url, media_name, reply_to_id, status, is_deleted, created_at
            "#
        )
        .bind(new.conversation_id)
        .bind(new.sender_id)
        .bind(&new.content)
        .bind(new.message_type.as_str())
        .bind(&new.media_url)
        .bind(&new.media_name)
        .bind(new.reply_to_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        // Bump conversation recency for list ordering
        sqlx::query(
            r#"
            UPDATE conversations SET updated_at = $1 WHERE id = $2
            "#
        )
        .bind(now)
        .bind(new.conversation_id)
        .execute(&self.pool)
        .await?;

        Ok(message_from_row(&row))
    }

    async fn get_message_with_context(&self, message_id: i64) -> Result<Option<MessageWithContext>> {
        let row = sqlx::query(
            r#"
            SELECT m.id, m.conversation_id, m.sender_id, m.content, m.message_type,
                   m.media_url, m.media_name, m.reply_to_id, m.status, m.is_deleted, m.created_at,
                   u.username, u.display_name, u.avatar_url, u.is_online, u.last_seen,
                   r.id AS reply_id, r.sender_id AS reply_sender_id,
                   r.content AS reply_content, r.message_type AS reply_message_type
            FROM messages m
            INNER JOIN users u ON u.id = m.sender_id
            LEFT JOIN messages r ON r.id = m.reply_to_id
            WHERE m.id = $1
            "#
        )
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| {
            let message = message_from_row(&row);
            let sender = UserSummary {
                id: message.sender_id,
                username: row.get("username"),
                display_name: row.get("display_name"),
                avatar_url: row.get("avatar_url"),
                is_online: row.get("is_online"),
                last_seen: row.get("last_seen"),
            };
            let reply_to = row.get::<Option<i64>, _>("reply_id").map(|reply_id| {
                let reply_type: String = row.get("reply_message_type");
                ReplyPreview {
                    id: reply_id,
                    sender_id: row.get("reply_sender_id"),
                    content: row.get("reply_content"),
                    message_type: MessageType::from_str(&reply_type),
                }
            });
            MessageWithContext { message, sender, reply_to }
        }))
    }

    async fn is_conversation_participant(&self, conversation_id: Uuid, user_id: Uuid) -> Result<bool> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS count
            FROM conversation_participants
            WHERE conversation_id = $1 AND user_id = $2
            "#
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        let count: i64 = row.get("count");
        Ok(count > 0)
    }

    async fn mark_delivered(&self, message_id: i64) -> Result<bool> {
        // The status predicate makes the flip a compare-and-set: two
        // racing writers get exactly one affected row between them
        let result = sqlx::query(
            r#"
            UPDATE messages SET status = 'delivered'
            WHERE id = $1 AND status = 'sent' AND is_deleted = FALSE
            "#
        )
        .bind(message_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn upsert_read_receipt(&self, message_id: i64, user_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO read_receipts (message_id, user_id, read_at)
            SELECT $1, $2, $3 WHERE EXISTS (SELECT 1 FROM messages WHERE id = $1)
            ON CONFLICT (message_id, user_id) DO NOTHING
            "#
        )
        .bind(message_id)
        .bind(user_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn advance_last_read_watermark(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        message_id: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE conversation_participants
            SET last_read_message_id = GREATEST(last_read_message_id, $3)
            WHERE conversation_id = $1 AND user_id = $2
            "#
        )
        .bind(conversation_id)
        .bind(user_id)
        .bind(message_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_conversation_read(
        &self,
        conversation_id: Uuid,
        reader_id: Uuid,
        up_to_message_id: i64,
    ) -> Result<Vec<ReadTransition>> {
        let rows = sqlx::query(
            r#"
            UPDATE messages SET status = 'read'
            WHERE conversation_id = $1 AND id <= $2 AND sender_id <> $3
              AND status <> 'read' AND is_deleted = FALSE
            RETURNING id, sender_id
            "#
        )
        .bind(conversation_id)
        .bind(up_to_message_id)
        .bind(reader_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| ReadTransition {
                message_id: row.get("id"),
                sender_id: row.get("sender_id"),
            })
            .collect())
    }

    async fn list_participants(&self, conversation_id: Uuid) -> Result<Vec<Participant>> {
        let rows = sqlx::query(
            r#"
            SELECT cp.user_id, u.push_token
            FROM conversation_participants cp
            INNER JOIN users u ON u.id = cp.user_id
            WHERE cp.conversation_id = $1
            "#
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Participant {
                user_id: row.get("user_id"),
                push_token: row.get("push_token"),
            })
            .collect())
    }

    async fn set_user_presence(&self, user_id: Uuid, is_online: bool, last_seen: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE users SET is_online = $2, last_seen = $3 WHERE id = $1
            "#
        )
        .bind(user_id)
        .bind(is_online)
        .bind(last_seen)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_user_conversation_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        let rows = sqlx::query(
            r#"
            SELECT conversation_id FROM conversation_participants WHERE user_id = $1
            "#
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| row.get("conversation_id")).collect())
    }

    async fn claim_pending_deliveries(&self, user_id: Uuid) -> Result<Vec<PendingDelivery>> {
        // Single-statement flip-and-return: the status predicate keeps
        // each row in exactly one claimer's result set
        let rows = sqlx::query(
            r#"
            UPDATE messages m SET status = 'delivered'
            FROM conversation_participants cp
            WHERE cp.conversation_id = m.conversation_id AND cp.user_id = $1
              AND m.sender_id <> $1 AND m.status = 'sent' AND m.is_deleted = FALSE
            RETURNING m.id, m.conversation_id, m.sender_id
            "#
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut claimed: Vec<PendingDelivery> = rows
            .into_iter()
            .map(|row| PendingDelivery {
                message_id: row.get("id"),
                conversation_id: row.get("conversation_id"),
                sender_id: row.get("sender_id"),
            })
            .collect();
        claimed.sort_by_key(|p| p.message_id);
        Ok(claimed)
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<UserSummary>> {
        let row = sqlx::query(
            r#"
            SELECT id, username, display_name, avatar_url, is_online, last_seen
            FROM users
            WHERE id = $1
            "#
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| UserSummary {
            id: row.get("id"),
            username: row.get("username"),
            display_name: row.get("display_name"),
            avatar_url: row.get("avatar_url"),
            is_online: row.get("is_online"),
            last_seen: row.get("last_seen"),
        }))
    }

    async fn insert_call(&self, new: NewCall) -> Result<CallSession> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        let row = sqlx::query(
            r#"
            INSERT INTO calls (id, caller_id, callee_id, call_type, status, started_at, duration_seconds)
            VALUES ($1, $2, $3, $4, 'ongoing', $5, 0)
            RETURNING id, caller_id, callee_id, call_type, status, started_at, answered_at, ended_at, duration_seconds
            "#
        )
        .bind(id)
        .bind(new.caller_id)
        .bind(new.callee_id)
        .bind(new.call_type.as_str())
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(call_from_row(&row))
    }

    async fn get_call(&self, call_id: Uuid) -> Result<Option<CallSession>> {
        let row = sqlx::query(
            r#"
            SELECT id, caller_id, callee_id, call_type, status, started_at, answered_at, ended_at, duration_seconds
            FROM calls
            WHERE id = $1
            "#
        )
        .bind(call_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| call_from_row(&row)))
    }

    async fn transition_call(
        &self,
        call_id: Uuid,
        from: CallStatus,
        to: CallStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<CallSession>> {
        // Compare-and-set on the status column; duration is only
        // meaningful when the call passed through `answered`.
        let row = sqlx::query(
            r#"
            UPDATE calls SET
                status = $3,
                answered_at = CASE WHEN $3 = 'answered' THEN $4 ELSE answered_at END,
                ended_at = CASE WHEN $3 IN ('ended', 'rejected', 'missed') THEN $4 ELSE ended_at END,
                duration_seconds = CASE
                    WHEN $3 = 'ended' AND status = 'answered' AND answered_at IS NOT NULL
                    THEN GREATEST(0, EXTRACT(EPOCH FROM ($4 - answered_at))::BIGINT)
                    ELSE duration_seconds
                END
            WHERE id = $1 AND status = $2
            RETURNING id, caller_id, callee_id, call_type, status, started_at, answered_at, ended_at, duration_seconds
            "#
        )
        .bind(call_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| call_from_row(&row)))
    }
}
