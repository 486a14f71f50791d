/**
 * Backend Error Types
 *
 * This module defines the error taxonomy for the realtime backend.
 * Each variant carries enough context to be turned into either an
 * HTTP response (for the upgrade handshake) or a socket event
 * acknowledgment error.
 *
 * # Error Categories
 *
 * - `Auth` - missing/invalid/expired credential; rejects the connection
 *   attempt entirely, no partial state is created
 * - `Forbidden` - authenticated but not a participant of the target
 *   conversation or call; rejects the event, the connection stays open
 * - `NotFound` - referenced message/call does not exist or is already
 *   in a terminal state; rejects the event, no mutation applied
 * - `Validation` - malformed payload, rejected before any store call
 * - `Database` - transient persistence failure; surfaced as a generic
 *   ack failure, never retried by the core
 */

use axum::http::StatusCode;
use thiserror::Error;

use crate::shared::SharedError;

/// Backend-specific error types
#[derive(Debug, Error)]
pub enum BackendError {
    /// Missing, invalid or expired credential
    #[error("Authentication error: {message}")]
    Auth {
        /// Human-readable error message
        message: String,
    },

    /// Authenticated but not authorized for the target resource
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Human-readable error message
        message: String,
    },

    /// Referenced entity missing or already in a terminal state
    #[error("Not found: {message}")]
    NotFound {
        /// Human-readable error message
        message: String,
    },

    /// Malformed payload, rejected before touching the store
    #[error(transparent)]
    Validation(#[from] SharedError),

    /// Transient persistence failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BackendError {
    /// Create a new authentication error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth { message: message.into() }
    }

    /// Create a new authorization error
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden { message: message.into() }
    }

    /// Create a new not-found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound { message: message.into() }
    }

    /// Create a new validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(SharedError::validation(field, message))
    }

    /// HTTP status code for this error (used on the upgrade handshake)
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Auth { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable code carried in event acknowledgments
    pub fn ack_code(&self) -> &'static str {
        match self {
            Self::Auth { .. } => "auth_error",
            Self::Forbidden { .. } => "forbidden",
            Self::NotFound { .. } => "not_found",
            Self::Validation(_) => "validation_error",
            Self::Database(_) => "internal_error",
            Self::Serialization(_) => "internal_error",
        }
    }

    /// Get the error message
    pub fn message(&self) -> String {
        match self {
            Self::Auth { message } => message.clone(),
            Self::Forbidden { message } => message.clone(),
            Self::NotFound { message } => message.clone(),
            Self::Validation(err) => err.to_string(),
            // Transient store failures surface as a generic message;
            // details stay in the server log.
            Self::Database(_) => "Internal error".to_string(),
            Self::Serialization(err) => err.to_string(),
        }
    }
}
