//! Connection Lifecycle
//!
//! One WebSocket per authenticated user session. The upgrade is only
//! granted after the JWT in the query string verifies; a bad token is
//! turned away with 401 before any state is touched.
//!
//! Once upgraded, a connection runs three kinds of tasks:
//! - the reader (this task) processing frames strictly in order,
//! - a writer task draining the connection's mpsc channel to the socket,
//! - one forwarder task per joined conversation room, bridging that
//!   room's broadcast channel into the mpsc channel.
//!
//! Teardown is guarded by the connection id so a reconnect racing an
//! old socket's cleanup never loses its fresh presence entry.

use std::collections::HashSet;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use uuid::Uuid;

use crate::backend::auth::authenticate;
use crate::backend::delivery;
use crate::backend::error::{BackendError, Result};
use crate::backend::persistence::Store;
use crate::backend::presence::ConnectionHandle;
use crate::backend::realtime::router;
use crate::backend::server::state::AppState;
use crate::shared::events::{ClientFrame, EventAck, ServerEvent, UserOffline};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// `GET /ws?token=<jwt>` upgrade endpoint
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    let token = match query.token {
        Some(token) => token,
        None => return BackendError::auth("Missing token").into_response(),
    };
    let user_id = match authenticate(&token) {
        Ok(user_id) => user_id,
        Err(e) => {
            tracing::debug!("WebSocket upgrade rejected: {}", e);
            return e.into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, user_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, user_id: Uuid) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    // Writer task: everything addressed to this connection funnels
    // through one channel, so socket writes are never contended
    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!("failed to serialize outbound event: {}", e);
                    continue;
                }
            };
            if ws_tx.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let handle = ConnectionHandle::new(user_id, tx.clone());
    let conn_id = handle.conn_id;
    state.presence.register(handle);
    tracing::info!(user = %user_id, conn = conn_id, "Connection established");

    // Pending-delivery sweep: messages that arrived while this user was
    // offline flip to delivered and their senders hear about it now
    match delivery::sweep_pending(state.store.as_ref(), user_id).await {
        Ok(notifications) => {
            for n in notifications {
                state
                    .presence
                    .send_to(n.recipient, ServerEvent::MessageStatusUpdate(n.update));
            }
        }
        Err(e) => tracing::error!(user = %user_id, "pending-delivery sweep failed: {}", e),
    }

    // Room subscriptions are a snapshot of membership at connect time;
    // membership changes take effect on the next reconnect
    let room_ids = match state.store.get_user_conversation_ids(user_id).await {
        Ok(ids) => ids,
        Err(e) => {
            tracing::error!(user = %user_id, "failed to load conversation rooms: {}", e);
            Vec::new()
        }
    };
    let mut forwarders: Vec<AbortHandle> = Vec::with_capacity(room_ids.len());
    for conversation_id in &room_ids {
        let mut room_rx = state.rooms.get_sender(*conversation_id).subscribe();
        let tx = tx.clone();
        let presence = state.presence.clone();
        let task = tokio::spawn(async move {
            while let Ok(event) = room_rx.recv().await {
                if event.excluded_user() == Some(user_id) {
                    continue;
                }
                // A superseded connection is no longer delivered to,
                // even while its socket lingers
                if !presence.is_current(user_id, conn_id) {
                    break;
                }
                if tx.send(event).is_err() {
                    break;
                }
            }
        });
        forwarders.push(task.abort_handle());
    }

    if let Err(e) = state.store.set_user_presence(user_id, true, Utc::now()).await {
        tracing::error!(user = %user_id, "failed to persist online presence: {}", e);
    }

    // Reader loop: frames are processed one at a time, so a client's
    // acks come back in the order it sent the requests
    while let Some(Ok(message)) = ws_rx.next().await {
        match message {
            Message::Text(text) => {
                handle_frame(&state, user_id, &tx, text.as_str()).await;
            }
            Message::Close(_) => break,
            // Pings are answered by the protocol layer
            _ => {}
        }
    }

    for forwarder in forwarders {
        forwarder.abort();
    }
    writer.abort();

    // Guarded teardown: only the registry's current owner of this user
    // entry gets to mark them offline
    if state.presence.unregister(user_id, conn_id) {
        let last_seen = Utc::now();
        if let Err(e) = state.store.set_user_presence(user_id, false, last_seen).await {
            tracing::error!(user = %user_id, "failed to persist offline presence: {}", e);
        }
        match offline_notice_recipients(state.store.as_ref(), user_id, &room_ids).await {
            Ok(peers) => {
                for peer in peers {
                    state
                        .presence
                        .send_to(peer, ServerEvent::UserOffline(UserOffline { user_id, last_seen }));
                }
            }
            Err(e) => {
                tracing::error!(user = %user_id, "failed to resolve offline notice recipients: {}", e)
            }
        }
        tracing::info!(user = %user_id, conn = conn_id, "Connection closed");
    } else {
        tracing::debug!(user = %user_id, conn = conn_id, "Connection superseded, skipping offline teardown");
    }
}

/// Parse and route one text frame, then ack if the client asked for one.
async fn handle_frame(
    state: &AppState,
    user_id: Uuid,
    tx: &mpsc::UnboundedSender<ServerEvent>,
    raw: &str,
) {
    let frame: ClientFrame = match serde_json::from_str(raw) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::debug!(user = %user_id, "malformed frame: {}", e);
            // Pair the rejection with the seq when one is recoverable
            if let Some(seq) = extract_seq(raw) {
                let ack = BackendError::validation("frame", format!("malformed frame: {e}")).into_ack(seq);
                let _ = tx.send(ServerEvent::Ack(ack));
            }
            return;
        }
    };

    let seq = frame.seq;
    match router::handle_event(state, user_id, frame.event).await {
        Ok(outcome) => {
            if let Some(seq) = seq {
                let _ = tx.send(ServerEvent::Ack(EventAck::ok(seq, outcome.data.clone())));
            }
            router::perform_dispatches(state, outcome.dispatches);
        }
        Err(e) => {
            tracing::debug!(user = %user_id, "event failed: {}", e);
            if let Some(seq) = seq {
                let _ = tx.send(ServerEvent::Ack(e.into_ack(seq)));
            }
        }
    }
}

/// Distinct co-participants across the user's joined rooms. A peer
/// sharing several conversations with the user appears once, so they
/// get one offline notice, not one per shared room.
async fn offline_notice_recipients(
    store: &dyn Store,
    user_id: Uuid,
    room_ids: &[Uuid],
) -> Result<Vec<Uuid>> {
    let mut peers = HashSet::new();
    for conversation_id in room_ids {
        for participant in store.list_participants(*conversation_id).await? {
            if participant.user_id != user_id {
                peers.insert(participant.user_id);
            }
        }
    }
    let mut peers: Vec<Uuid> = peers.into_iter().collect();
    peers.sort();
    Ok(peers)
}

fn extract_seq(raw: &str) -> Option<u64> {
    serde_json::from_str::<Value>(raw)
        .ok()?
        .get("seq")?
        .as_u64()
}
