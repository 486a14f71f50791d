//! Call Session Data Structures
//!
//! A call session lives in the persistence collaborator; the signaling
//! relay only ever moves it forward through guarded transitions:
//!
//! ```text
//! ongoing --answer--> answered --end--> ended
//! ongoing --reject--> rejected
//! ongoing --end----->  ended            (hangup before answer)
//! ongoing --missed--> missed
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audio or video call
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CallType {
    Audio,
    Video,
}

impl CallType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallType::Audio => "audio",
            CallType::Video => "video",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "video" => CallType::Video,
            _ => CallType::Audio,
        }
    }
}

/// Lifecycle state of a call session
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    /// Ringing, waiting for the callee
    Ongoing,
    /// Callee picked up
    Answered,
    /// Callee declined (terminal)
    Rejected,
    /// Callee never picked up (terminal)
    Missed,
    /// Hung up by either party (terminal)
    Ended,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Ongoing => "ongoing",
            CallStatus::Answered => "answered",
            CallStatus::Rejected => "rejected",
            CallStatus::Missed => "missed",
            CallStatus::Ended => "ended",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "answered" => CallStatus::Answered,
            "rejected" => CallStatus::Rejected,
            "missed" => CallStatus::Missed,
            "ended" => CallStatus::Ended,
            _ => CallStatus::Ongoing,
        }
    }

    /// Terminal states admit no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, CallStatus::Ended | CallStatus::Rejected | CallStatus::Missed)
    }
}

/// A call session as stored by the persistence collaborator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallSession {
    pub id: Uuid,
    pub caller_id: Uuid,
    pub callee_id: Uuid,
    pub call_type: CallType,
    pub status: CallStatus,
    pub started_at: DateTime<Utc>,
    pub answered_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Seconds between answer and end; zero unless the call was answered
    pub duration_seconds: i64,
}

impl CallSession {
    /// The participant on the other side of the call from `user_id`
    pub fn peer_of(&self, user_id: Uuid) -> Option<Uuid> {
        if user_id == self.caller_id {
            Some(self.callee_id)
        } else if user_id == self.callee_id {
            Some(self.caller_id)
        } else {
            None
        }
    }

    /// Whether `user_id` is a participant at all
    pub fn involves(&self, user_id: Uuid) -> bool {
        self.peer_of(user_id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!CallStatus::Ongoing.is_terminal());
        assert!(!CallStatus::Answered.is_terminal());
        assert!(CallStatus::Rejected.is_terminal());
        assert!(CallStatus::Missed.is_terminal());
        assert!(CallStatus::Ended.is_terminal());
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            CallStatus::Ongoing,
            CallStatus::Answered,
            CallStatus::Rejected,
            CallStatus::Missed,
            CallStatus::Ended,
        ] {
            assert_eq!(CallStatus::from_str(status.as_str()), status);
        }
    }

    #[test]
    fn test_peer_lookup() {
        let caller = Uuid::new_v4();
        let callee = Uuid::new_v4();
        let call = CallSession {
            id: Uuid::new_v4(),
            caller_id: caller,
            callee_id: callee,
            call_type: CallType::Audio,
            status: CallStatus::Ongoing,
            started_at: Utc::now(),
            answered_at: None,
            ended_at: None,
            duration_seconds: 0,
        };
        assert_eq!(call.peer_of(caller), Some(callee));
        assert_eq!(call.peer_of(callee), Some(caller));
        assert_eq!(call.peer_of(Uuid::new_v4()), None);
        assert!(call.involves(caller));
    }
}
