//! Backend Module
//!
//! This module contains all server-side code for the confab realtime
//! chat backend: the Axum server, the WebSocket connection lifecycle,
//! message delivery and read tracking, call signaling, and persistence.
//!
//! # Architecture
//!
//! The backend is organized into focused submodules:
//!
//! - **`server`** - Server initialization, application state, configuration
//! - **`routes`** - HTTP route configuration and router assembly
//! - **`realtime`** - WebSocket connections, event routing, room fan-out
//! - **`presence`** - Live connection registry
//! - **`delivery`** - Message status lifecycle (sent/delivered/read)
//! - **`calls`** - Call session transitions and WebRTC relay
//! - **`persistence`** - Store trait with Postgres and in-memory backends
//! - **`push`** - Push notification dispatch for offline recipients
//! - **`auth`** - JWT verification for connection admission
//! - **`error`** - Backend-specific error types
//!
//! # Module Structure
//!
//! ```text
//! backend/
//! ├── mod.rs          - Module exports and documentation
//! ├── server/         - Server initialization and state
//! ├── routes/         - Route configuration
//! ├── realtime/       - Connections, router, rooms
//! ├── presence/       - Connection registry
//! ├── delivery/       - Message status lifecycle
//! ├── calls/          - Call signaling
//! ├── persistence/    - Store trait and backends
//! ├── push/           - Push dispatch
//! ├── auth/           - JWT verification
//! └── error/          - Error types
//! ```
//!
//! # State Management
//!
//! Shared state (`AppState`) carries the store, the presence registry,
//! the room broadcast map, and the push dispatcher. Every piece is
//! cheaply cloneable; connection tasks hold their own clones.
//!
//! # Error Handling
//!
//! The backend uses `BackendError` throughout, propagated with the `?`
//! operator. Errors surface as HTTP status codes on the REST side and
//! as machine-readable ack codes on the WebSocket side.

pub mod auth;
pub mod calls;
pub mod delivery;
pub mod error;
pub mod persistence;
pub mod presence;
pub mod push;
pub mod realtime;
pub mod routes;
pub mod server;

// Re-export commonly used types
pub use error::BackendError;
pub use persistence::{MemoryStore, PgStore, SharedStore, Store};
pub use presence::PresenceRegistry;
pub use server::{create_app, AppState};
