/**
 * Server Initialization
 *
 * This module handles the initialization and setup of the Axum HTTP
 * server, including state creation, store loading, and route
 * configuration.
 *
 * # Initialization Process
 *
 * 1. Load the persistence backend (Postgres, or in-memory fallback)
 * 2. Start the push dispatch worker
 * 3. Create the presence registry and room broadcast map
 * 4. Create and configure the router
 * 5. Start the periodic room channel cleanup task
 */

use axum::Router;
use std::sync::Arc;

use crate::backend::presence::PresenceRegistry;
use crate::backend::realtime::rooms::RoomBroadcasts;
use crate::backend::routes::router::create_router;
use crate::backend::server::config::{load_push, load_store};
use crate::backend::server::state::AppState;

/// Create and configure the Axum application
///
/// The function is designed to be resilient: a missing database or
/// push gateway downgrades the corresponding service instead of
/// preventing startup.
pub async fn create_app() -> Router<()> {
    tracing::info!("Initializing confab backend server");

    let store = load_store().await;
    let push = load_push();

    let app_state = AppState {
        store,
        presence: Arc::new(PresenceRegistry::new()),
        rooms: RoomBroadcasts::new(),
        push,
    };

    let app = create_router(app_state.clone());

    // Rooms whose last subscriber disconnected linger in the map until
    // this sweep drops them
    let cleanup_rooms = app_state.rooms.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            cleanup_rooms.cleanup_inactive_channels();
            tracing::debug!("Cleaned up inactive room broadcast channels");
        }
    });

    tracing::info!("Router configured with periodic cleanup task");

    app
}
