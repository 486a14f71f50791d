//! User Profile Summary
//!
//! The slice of a user profile the realtime core attaches to outbound
//! events. Full user records (credentials, settings) belong to the
//! account subsystem and never cross this boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Public profile summary joined onto messages and presence responses
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub is_online: bool,
    pub last_seen: DateTime<Utc>,
}

impl UserSummary {
    /// Name shown in notification titles and call banners
    pub fn display_label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }
}
