//! Presence Registry
//!
//! Process-wide mapping from user identity to the live connection
//! handle for that user. This is the only in-memory state shared
//! across connection handlers, so its operations are deliberately
//! cheap and lock-scoped: no I/O ever happens while a shard lock is
//! held.
//!
//! # Semantics
//!
//! - One entry per user, last-connect-wins. Registering a second
//!   device replaces the first handle; the replaced handle is orphaned
//!   (its socket stays open until it dies on its own) but targeted
//!   delivery only ever resolves through the registry.
//! - Unregister is guarded by connection id: a slow disconnect from an
//!   old handle racing a fast reconnect must not evict the new entry.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::shared::events::ServerEvent;

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

/// Handle to one live connection: a process-unique id plus the
/// outbound event channel drained by the connection's writer task.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub conn_id: u64,
    pub user_id: Uuid,
    tx: mpsc::UnboundedSender<ServerEvent>,
}

impl ConnectionHandle {
    pub fn new(user_id: Uuid, tx: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self {
            conn_id: NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed),
            user_id,
            tx,
        }
    }

    /// Queue an event for this connection. A closed channel means the
    /// connection is tearing down; the event is simply dropped.
    pub fn send(&self, event: ServerEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!(conn_id = self.conn_id, "dropping event for closed connection");
        }
    }
}

/// Registry of live connections, one entry per user
#[derive(Default)]
pub struct PresenceRegistry {
    entries: DashMap<Uuid, ConnectionHandle>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection for a user, unconditionally replacing any
    /// existing entry (last-connect-wins). Never fails.
    pub fn register(&self, handle: ConnectionHandle) {
        let user_id = handle.user_id;
        if let Some(prior) = self.entries.insert(user_id, handle) {
            tracing::debug!(%user_id, prior_conn = prior.conn_id, "replaced presence entry");
        }
    }

    /// Remove the entry for `user_id` only if it still belongs to
    /// `conn_id`. A stale disconnect for a replaced handle is a no-op.
    pub fn unregister(&self, user_id: Uuid, conn_id: u64) -> bool {
        self.entries
            .remove_if(&user_id, |_, handle| handle.conn_id == conn_id)
            .is_some()
    }

    /// Current handle for a user, if they are connected
    pub fn lookup(&self, user_id: Uuid) -> Option<ConnectionHandle> {
        self.entries.get(&user_id).map(|entry| entry.value().clone())
    }

    /// Whether the user has a live connection
    pub fn is_online(&self, user_id: Uuid) -> bool {
        self.entries.contains_key(&user_id)
    }

    /// Whether `conn_id` still owns the user's registry entry. A
    /// replaced connection is never current again; its broadcasts stop
    /// here even while its socket lingers.
    pub fn is_current(&self, user_id: Uuid, conn_id: u64) -> bool {
        self.entries
            .get(&user_id)
            .map(|entry| entry.conn_id == conn_id)
            .unwrap_or(false)
    }

    /// Snapshot of all connected user ids
    pub fn snapshot_user_ids(&self) -> Vec<Uuid> {
        self.entries.iter().map(|entry| *entry.key()).collect()
    }

    /// Send an event to a user's live connection, if any.
    /// Returns whether a connection was found.
    pub fn send_to(&self, user_id: Uuid, event: ServerEvent) -> bool {
        match self.lookup(user_id) {
            Some(handle) => {
                handle.send(event);
                true
            }
            None => false,
        }
    }
}
