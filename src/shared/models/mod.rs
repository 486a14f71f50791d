//! Domain models shared between the wire protocol and the backend

/// Chat message and delivery status types
pub mod message;

/// Call session types
pub mod call;

/// User profile summary
pub mod user;

pub use call::{CallSession, CallStatus, CallType};
pub use message::{ChatMessage, MessageStatus, MessageType, MessageWithContext, ReplyPreview};
pub use user::UserSummary;
