//! Persistence Module
//!
//! The store trait the realtime core depends on, plus its two
//! backends. Which one the server uses is decided at startup from the
//! environment (`DATABASE_URL` present -> PostgreSQL, absent ->
//! in-memory).
//!
//! # Module Structure
//!
//! ```text
//! persistence/
//! ├── mod.rs       - Module exports
//! ├── store.rs     - Store trait and operation payloads
//! ├── postgres.rs  - PgStore (sqlx)
//! └── memory.rs    - MemoryStore (dev / tests)
//! ```

/// Store trait and payload types
pub mod store;

/// PostgreSQL backend
pub mod postgres;

/// In-memory backend
pub mod memory;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::{NewCall, NewMessage, Participant, PendingDelivery, ReadTransition, Store};

use std::sync::Arc;

/// Shared handle to whichever backend the server was started with
pub type SharedStore = Arc<dyn Store>;
