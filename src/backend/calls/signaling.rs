//! WebRTC signaling passthrough.
//!
//! Offer/answer/ICE payloads are opaque to the server; they are
//! restamped with the sender's identity and forwarded to the named
//! peer's live connection. An offline peer simply drops the signal,
//! the caller's client handles renegotiation on its own.

use serde_json::Value;
use uuid::Uuid;

use crate::shared::events::{ServerEvent, SignalRelay};

/// Which leg of the WebRTC handshake a signal belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

/// Build the outbound relay event for a signal from `sender_id`.
pub fn relay_event(kind: SignalKind, sender_id: Uuid, payload: Value) -> ServerEvent {
    let relay = SignalRelay { sender_id, payload };
    match kind {
        SignalKind::Offer => ServerEvent::WebrtcOffer(relay),
        SignalKind::Answer => ServerEvent::WebrtcAnswer(relay),
        SignalKind::IceCandidate => ServerEvent::WebrtcIceCandidate(relay),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_relay_preserves_payload_verbatim() {
        let sender = Uuid::new_v4();
        let sdp = json!({"type": "offer", "sdp": "v=0\r\no=- 46117317 2 IN IP4 127.0.0.1"});

        let event = relay_event(SignalKind::Offer, sender, sdp.clone());
        match event {
            ServerEvent::WebrtcOffer(relay) => {
                assert_eq!(relay.sender_id, sender);
                assert_eq!(relay.payload, sdp);
            }
            other => panic!("expected webrtc_offer, got {other:?}"),
        }
    }

    #[test]
    fn test_each_kind_maps_to_its_event() {
        let sender = Uuid::new_v4();
        assert!(matches!(
            relay_event(SignalKind::Answer, sender, json!({})),
            ServerEvent::WebrtcAnswer(_)
        ));
        assert!(matches!(
            relay_event(SignalKind::IceCandidate, sender, json!({"candidate": "..."})),
            ServerEvent::WebrtcIceCandidate(_)
        ));
    }
}
