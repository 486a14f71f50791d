//! Call Signaling Relay
//!
//! Coordinates one-to-one call sessions: session rows move through
//! `ongoing -> answered | rejected | missed` and `ongoing | answered ->
//! ended`, with every transition compare-and-set against the stored
//! status so concurrent actions on the same call resolve to exactly one
//! winner. Role guards are enforced here (only the callee answers,
//! rejects, or reports a miss; either participant ends) before the
//! store is touched.
//!
//! Like the delivery layer, operations mutate first and return the
//! peer notification for the caller to dispatch. WebRTC payload relay
//! lives in [`signaling`] and never touches the store.

pub mod signaling;

use chrono::Utc;
use uuid::Uuid;

use crate::backend::error::{BackendError, Result};
use crate::backend::persistence::{NewCall, Store};
use crate::shared::events::{CallEnded, CallRefPayload, IncomingCall, ServerEvent};
use crate::shared::models::{CallSession, CallStatus, CallType};

/// A call event addressed to one user's live connection
#[derive(Debug, Clone)]
pub struct CallNotification {
    pub recipient: Uuid,
    pub event: ServerEvent,
}

/// Outcome of a call operation: the updated session for the actor's
/// acknowledgment, plus the notification owed to the other party.
#[derive(Debug)]
pub struct CallOutcome {
    pub call: CallSession,
    pub notification: Option<CallNotification>,
}

/// Start a call session and address the ring at the callee.
///
/// The session is created `ongoing` regardless of the callee's
/// presence; an unreachable callee simply never sees the ring and the
/// caller's client reports the miss when it gives up.
pub async fn initiate(
    store: &dyn Store,
    caller_id: Uuid,
    callee_id: Uuid,
    call_type: CallType,
) -> Result<CallOutcome> {
    if callee_id == caller_id {
        return Err(BackendError::validation("callee_id", "cannot call yourself"));
    }
    let caller = store
        .get_user(caller_id)
        .await?
        .ok_or_else(|| BackendError::not_found("Caller profile not found"))?;
    if store.get_user(callee_id).await?.is_none() {
        return Err(BackendError::not_found("Callee not found"));
    }

    let call = store
        .insert_call(NewCall {
            caller_id,
            callee_id,
            call_type,
        })
        .await?;

    tracing::info!(call_id = %call.id, caller = %caller_id, callee = %callee_id, "Call initiated");

    let notification = CallNotification {
        recipient: callee_id,
        event: ServerEvent::IncomingCall(IncomingCall {
            call: call.clone(),
            caller,
        }),
    };
    Ok(CallOutcome {
        call,
        notification: Some(notification),
    })
}

/// Callee accepts the ring: `ongoing -> answered`, caller is notified.
pub async fn answer(store: &dyn Store, actor_id: Uuid, call_id: Uuid) -> Result<CallOutcome> {
    let call = transition_as_callee(store, actor_id, call_id, CallStatus::Answered).await?;
    let notification = CallNotification {
        recipient: call.caller_id,
        event: ServerEvent::CallAnswered(CallRefPayload { call_id: call.id }),
    };
    Ok(CallOutcome {
        call,
        notification: Some(notification),
    })
}

/// Callee declines the ring: `ongoing -> rejected`, caller is notified.
pub async fn reject(store: &dyn Store, actor_id: Uuid, call_id: Uuid) -> Result<CallOutcome> {
    let call = transition_as_callee(store, actor_id, call_id, CallStatus::Rejected).await?;
    let notification = CallNotification {
        recipient: call.caller_id,
        event: ServerEvent::CallRejected(CallRefPayload { call_id: call.id }),
    };
    Ok(CallOutcome {
        call,
        notification: Some(notification),
    })
}

/// Callee reports an unanswered ring: `ongoing -> missed`, caller is
/// notified so its ringing UI stops without a timer of its own.
pub async fn missed(store: &dyn Store, actor_id: Uuid, call_id: Uuid) -> Result<CallOutcome> {
    let call = transition_as_callee(store, actor_id, call_id, CallStatus::Missed).await?;
    let notification = CallNotification {
        recipient: call.caller_id,
        event: ServerEvent::CallMissed(CallRefPayload { call_id: call.id }),
    };
    Ok(CallOutcome {
        call,
        notification: Some(notification),
    })
}

/// Either participant hangs up.
///
/// An answered call ends with its duration computed from the answer
/// timestamp; a call ended straight from `ongoing` (caller gave up
/// before the pickup) carries zero duration.
pub async fn end(store: &dyn Store, actor_id: Uuid, call_id: Uuid) -> Result<CallOutcome> {
    let current = store
        .get_call(call_id)
        .await?
        .ok_or_else(|| BackendError::not_found("Call not found"))?;
    if !current.involves(actor_id) {
        return Err(BackendError::forbidden("Not a participant in this call"));
    }

    let now = Utc::now();
    let call = match store
        .transition_call(call_id, CallStatus::Answered, CallStatus::Ended, now)
        .await?
    {
        Some(call) => call,
        None => store
            .transition_call(call_id, CallStatus::Ongoing, CallStatus::Ended, now)
            .await?
            .ok_or_else(|| BackendError::not_found("Call already concluded"))?,
    };

    tracing::info!(call_id = %call.id, duration = call.duration_seconds, "Call ended");

    let notification = call.peer_of(actor_id).map(|peer| CallNotification {
        recipient: peer,
        event: ServerEvent::CallEnded(CallEnded {
            call_id: call.id,
            duration_seconds: call.duration_seconds,
        }),
    });
    Ok(CallOutcome { call, notification })
}

/// Shared guard for the callee-only `ongoing -> *` transitions.
async fn transition_as_callee(
    store: &dyn Store,
    actor_id: Uuid,
    call_id: Uuid,
    to: CallStatus,
) -> Result<CallSession> {
    let current = store
        .get_call(call_id)
        .await?
        .ok_or_else(|| BackendError::not_found("Call not found"))?;
    if current.callee_id != actor_id {
        return Err(BackendError::forbidden("Only the callee may do that"));
    }

    store
        .transition_call(call_id, CallStatus::Ongoing, to, Utc::now())
        .await?
        .ok_or_else(|| BackendError::not_found("Call is no longer ringing"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;

    use crate::backend::persistence::MemoryStore;
    use crate::shared::models::UserSummary;

    fn seed_user(store: &MemoryStore) -> Uuid {
        let id = Uuid::new_v4();
        store.upsert_user(
            UserSummary {
                id,
                username: format!("user-{}", &id.to_string()[..8]),
                display_name: None,
                avatar_url: None,
                is_online: false,
                last_seen: Utc::now(),
            },
            None,
        );
        id
    }

    #[tokio::test]
    async fn test_initiate_rings_callee() {
        let store = MemoryStore::new();
        let (caller, callee) = (seed_user(&store), seed_user(&store));

        let outcome = initiate(&store, caller, callee, CallType::Video).await.unwrap();

        assert_eq!(outcome.call.status, CallStatus::Ongoing);
        assert_eq!(outcome.call.caller_id, caller);
        let notification = outcome.notification.unwrap();
        assert_eq!(notification.recipient, callee);
        match notification.event {
            ServerEvent::IncomingCall(incoming) => {
                assert_eq!(incoming.call.id, outcome.call.id);
                assert_eq!(incoming.caller.id, caller);
            }
            other => panic!("expected incoming_call, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cannot_call_yourself() {
        let store = MemoryStore::new();
        let user = seed_user(&store);

        let err = initiate(&store, user, user, CallType::Audio).await.unwrap_err();
        assert_matches!(err, BackendError::Validation(_));
    }

    #[tokio::test]
    async fn test_initiate_requires_existing_callee() {
        let store = MemoryStore::new();
        let caller = seed_user(&store);

        let err = initiate(&store, caller, Uuid::new_v4(), CallType::Audio)
            .await
            .unwrap_err();
        assert_matches!(err, BackendError::NotFound { .. });
    }

    #[tokio::test]
    async fn test_only_callee_can_answer() {
        let store = MemoryStore::new();
        let (caller, callee) = (seed_user(&store), seed_user(&store));
        let call = initiate(&store, caller, callee, CallType::Audio).await.unwrap().call;

        let err = answer(&store, caller, call.id).await.unwrap_err();
        assert_matches!(err, BackendError::Forbidden { .. });

        let outcome = answer(&store, callee, call.id).await.unwrap();
        assert_eq!(outcome.call.status, CallStatus::Answered);
        assert!(outcome.call.answered_at.is_some());
        assert_eq!(outcome.notification.unwrap().recipient, caller);
    }

    #[tokio::test]
    async fn test_concurrent_answer_and_reject_resolve_to_one_winner() {
        let store = MemoryStore::new();
        let (caller, callee) = (seed_user(&store), seed_user(&store));
        let call = initiate(&store, caller, callee, CallType::Audio).await.unwrap().call;

        answer(&store, callee, call.id).await.unwrap();

        // The losing transition fails the compare-and-set guard
        let err = reject(&store, callee, call.id).await.unwrap_err();
        assert_matches!(err, BackendError::NotFound { .. });
        let stored = store.get_call(call.id).await.unwrap().unwrap();
        assert_eq!(stored.status, CallStatus::Answered);
    }

    #[tokio::test]
    async fn test_either_party_can_end_answered_call() {
        let store = MemoryStore::new();
        let (caller, callee) = (seed_user(&store), seed_user(&store));
        let call = initiate(&store, caller, callee, CallType::Video).await.unwrap().call;
        answer(&store, callee, call.id).await.unwrap();

        let outcome = end(&store, caller, call.id).await.unwrap();
        assert_eq!(outcome.call.status, CallStatus::Ended);
        assert!(outcome.call.ended_at.is_some());
        assert_eq!(outcome.notification.unwrap().recipient, callee);
    }

    #[tokio::test]
    async fn test_end_before_answer_has_zero_duration() {
        let store = MemoryStore::new();
        let (caller, callee) = (seed_user(&store), seed_user(&store));
        let call = initiate(&store, caller, callee, CallType::Audio).await.unwrap().call;

        let outcome = end(&store, caller, call.id).await.unwrap();
        assert_eq!(outcome.call.status, CallStatus::Ended);
        assert_eq!(outcome.call.duration_seconds, 0);
    }

    #[tokio::test]
    async fn test_outsider_cannot_end() {
        let store = MemoryStore::new();
        let (caller, callee, outsider) = (seed_user(&store), seed_user(&store), seed_user(&store));
        let call = initiate(&store, caller, callee, CallType::Audio).await.unwrap().call;

        let err = end(&store, outsider, call.id).await.unwrap_err();
        assert_matches!(err, BackendError::Forbidden { .. });
    }

    #[tokio::test]
    async fn test_missed_notifies_caller_and_is_terminal() {
        let store = MemoryStore::new();
        let (caller, callee) = (seed_user(&store), seed_user(&store));
        let call = initiate(&store, caller, callee, CallType::Audio).await.unwrap().call;

        let outcome = missed(&store, callee, call.id).await.unwrap();
        assert_eq!(outcome.call.status, CallStatus::Missed);
        let notification = outcome.notification.unwrap();
        assert_eq!(notification.recipient, caller);
        assert_matches!(notification.event, ServerEvent::CallMissed(_));

        // Terminal state: a late answer bounces off
        let err = answer(&store, callee, call.id).await.unwrap_err();
        assert_matches!(err, BackendError::NotFound { .. });
    }
}
