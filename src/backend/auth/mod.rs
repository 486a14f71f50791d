//! Authentication Module
//!
//! JWT verification for the realtime connection handshake. This
//! backend never issues tokens for real users; it consumes tokens
//! minted by the account service (the test-only `create_token` helper
//! shares the signing logic so tests exercise the real verify path).

/// JWT token handling
pub mod sessions;

pub use sessions::{authenticate, verify_token, Claims};
