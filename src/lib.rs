//! Confab - Realtime Chat Backend
//!
//! Confab is the realtime delivery core of a chat application: message
//! fan-out with delivery and read tracking, live presence, typing
//! indicators, and one-to-one call signaling with WebRTC relay, all
//! over a single authenticated WebSocket per user.
//!
//! # Module Structure
//!
//! The library is organized into two main modules:
//!
//! - **`shared`** - Types shared between server and clients
//!   - Message, call, and user models
//!   - The wire protocol event types
//!   - Error types
//!
//! - **`backend`** - Server-side code
//!   - Axum HTTP server with the WebSocket upgrade endpoint
//!   - Presence registry, delivery state machine, call signaling
//!   - Persistence (PostgreSQL or in-memory) and push dispatch
//!
//! # Usage
//!
//! ```rust,no_run
//! use confab::backend::server::init::create_app;
//!
//! # async fn example() {
//! let app = create_app().await;
//! // Use app with Axum server
//! # }
//! ```
//!
//! # Delivery Semantics
//!
//! Message status is monotonic (`sent -> delivered -> read`) and
//! tracked per message with per-recipient read receipts underneath.
//! Delivery is evaluated when a message is sent and again when a
//! recipient reconnects; read transitions happen in bulk up to a
//! client-supplied watermark. See `backend::delivery` for the rules.

/// Shared types and data structures
pub mod shared;

/// Backend server-side code
pub mod backend;
