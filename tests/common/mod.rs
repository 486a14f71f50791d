//! Shared test harness
//!
//! Builds a full application state over the in-memory store so the
//! suites can drive the event router exactly the way a connection task
//! does, without a running server or database.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use uuid::Uuid;

use confab::backend::presence::{ConnectionHandle, PresenceRegistry};
use confab::backend::push::{PushDispatcher, RecordingPush};
use confab::backend::realtime::rooms::RoomBroadcasts;
use confab::backend::realtime::router::{self, EventOutcome};
use confab::backend::server::state::AppState;
use confab::backend::{BackendError, MemoryStore};
use confab::shared::events::{ClientEvent, SendMessagePayload, ServerEvent};
use confab::shared::models::{MessageType, UserSummary};

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub push_sink: Arc<RecordingPush>,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let push_sink = Arc::new(RecordingPush::new());
        let state = AppState {
            store: store.clone(),
            presence: Arc::new(PresenceRegistry::new()),
            rooms: RoomBroadcasts::new(),
            push: PushDispatcher::spawn(push_sink.clone()),
        };
        Self { state, store, push_sink }
    }

    pub fn seed_user(&self, username: &str, push_token: Option<&str>) -> Uuid {
        let id = Uuid::new_v4();
        self.store.upsert_user(
            UserSummary {
                id,
                username: username.to_string(),
                display_name: None,
                avatar_url: None,
                is_online: false,
                last_seen: Utc::now(),
            },
            push_token.map(String::from),
        );
        id
    }

    /// Register a live connection for the user, as the socket task would
    pub fn connect(&self, user_id: Uuid) -> mpsc::UnboundedReceiver<ServerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state
            .presence
            .register(ConnectionHandle::new(user_id, tx));
        rx
    }

    /// Route one event and perform its dispatches, mirroring the
    /// connection task's handle-then-dispatch order
    pub async fn handle(
        &self,
        user_id: Uuid,
        event: ClientEvent,
    ) -> Result<EventOutcome, BackendError> {
        let outcome = router::handle_event(&self.state, user_id, event).await?;
        let data = outcome.data.clone();
        router::perform_dispatches(&self.state, outcome.dispatches);
        Ok(EventOutcome { data, dispatches: Vec::new() })
    }
}

pub fn text_message(conversation_id: Uuid, content: &str) -> ClientEvent {
    ClientEvent::SendMessage(SendMessagePayload {
        conversation_id,
        content: content.to_string(),
        message_type: MessageType::Text,
        media_url: None,
        media_name: None,
        reply_to_id: None,
    })
}

/// Drain everything currently queued on a connection channel
pub fn drain(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
