//! Shared Module
//!
//! Types shared between the realtime wire protocol and the backend:
//! domain models, socket event definitions, and boundary error types.
//! Everything here is plain serde data with no I/O dependencies.

/// Domain models: messages, calls, user summaries
pub mod models;

/// Realtime socket event types
pub mod events;

/// Shared error types
pub mod error;

/// Re-export commonly used types for convenience
pub use error::SharedError;
pub use events::{ClientEvent, ClientFrame, EventAck, ServerEvent};
pub use models::{CallSession, CallStatus, CallType, ChatMessage, MessageStatus, MessageType};
