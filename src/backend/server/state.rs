/**
 * Application State Management
 *
 * This module defines the application state structure and implements
 * the necessary `FromRef` traits for Axum state extraction.
 *
 * # Architecture
 *
 * The `AppState` struct serves as the central state container for the
 * application, holding:
 * - The persistence backend (Postgres or in-memory)
 * - The presence registry of live connections
 * - Per-conversation broadcast channels
 * - The push notification dispatcher
 *
 * # Thread Safety
 *
 * Every field is cheaply cloneable and safe to share across tasks:
 * the store is behind an `Arc<dyn Store>`, the presence registry uses
 * sharded concurrent maps, the room map is lock-scoped, and the push
 * dispatcher is a channel sender.
 *
 * # State Extraction
 *
 * The `FromRef` implementations allow Axum handlers to extract specific
 * parts of the state without needing the entire `AppState`. This follows
 * Axum's recommended pattern for state management.
 */

use axum::extract::FromRef;
use std::sync::Arc;

use crate::backend::persistence::SharedStore;
use crate::backend::presence::PresenceRegistry;
use crate::backend::push::PushDispatcher;
use crate::backend::realtime::rooms::RoomBroadcasts;

/// Central application state shared by all connections
#[derive(Clone)]
pub struct AppState {
    /// Persistence backend for messages, receipts, calls and presence
    pub store: SharedStore,
    /// Live connection registry, one entry per online user
    pub presence: Arc<PresenceRegistry>,
    /// Per-conversation broadcast channels for room fan-out
    pub rooms: RoomBroadcasts,
    /// Fire-and-forget push notification queue
    pub push: PushDispatcher,
}

impl FromRef<AppState> for SharedStore {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AppState> for Arc<PresenceRegistry> {
    fn from_ref(state: &AppState) -> Self {
        state.presence.clone()
    }
}

impl FromRef<AppState> for RoomBroadcasts {
    fn from_ref(state: &AppState) -> Self {
        state.rooms.clone()
    }
}

impl FromRef<AppState> for PushDispatcher {
    fn from_ref(state: &AppState) -> Self {
        state.push.clone()
    }
}
