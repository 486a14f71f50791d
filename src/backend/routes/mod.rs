//! Route Configuration
//!
//! Assembles the HTTP surface of the server. There is intentionally
//! very little here: everything interesting happens after the `/ws`
//! upgrade.

pub mod router;

pub use router::create_router;
