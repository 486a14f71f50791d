/**
 * Error Conversion
 *
 * Conversion implementations for backend errors: HTTP responses for
 * the WebSocket handshake path, and acknowledgment errors for the
 * socket event path.
 *
 * # Response Format
 *
 * HTTP error responses are JSON:
 * ```json
 * {
 *   "error": "Error message",
 *   "status": 401
 * }
 * ```
 */

use axum::{
    body::Body,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::backend::error::types::BackendError;
use crate::shared::events::EventAck;

impl IntoResponse for BackendError {
    /// Convert a backend error into an HTTP response
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.message();

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        Response::builder()
            .status(status)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
    }
}

impl BackendError {
    /// Convert this error into an acknowledgment for the given sequence number
    pub fn into_ack(self, seq: u64) -> EventAck {
        EventAck::err(seq, self.ack_code(), self.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_response_status() {
        let response = BackendError::auth("bad token").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_into_ack() {
        let ack = BackendError::forbidden("not a participant").into_ack(9);
        assert_eq!(ack.seq, 9);
        assert!(!ack.success);
        let err = ack.error.unwrap();
        assert_eq!(err.code, "forbidden");
        assert_eq!(err.message, "not a participant");
    }
}
