//! Real-time Delivery Module
//!
//! This module owns the WebSocket side of the server: connection
//! upgrades, per-connection task wiring, event routing, and the
//! per-conversation broadcast channels.
//!
//! # Module Structure
//!
//! ```text
//! realtime/
//! ├── mod.rs          - Module exports and documentation
//! ├── connection.rs   - WebSocket upgrade and connection lifecycle
//! ├── router.rs       - Inbound event dispatch and acknowledgments
//! └── rooms.rs        - Per-conversation broadcast channels
//! ```
//!
//! # Flow
//!
//! A frame arrives on a connection's reader task, is routed by
//! `router::handle_event`, acked, and its resulting notifications go
//! either to one user's mpsc channel (via the presence registry) or to
//! a conversation's broadcast channel (fanned out by each subscriber's
//! forwarder task).

pub mod connection;
pub mod rooms;
pub mod router;

pub use connection::ws_handler;
pub use rooms::RoomBroadcasts;
