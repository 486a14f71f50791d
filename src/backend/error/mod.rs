//! Backend Error Module
//!
//! Error taxonomy for the realtime backend and its conversions.
//!
//! # Module Structure
//!
//! ```text
//! error/
//! ├── mod.rs        - Module exports
//! ├── types.rs      - Error type definitions
//! └── conversion.rs - IntoResponse / ack conversions
//! ```

/// Error type definitions
pub mod types;

/// Error conversion implementations
pub mod conversion;

// Re-export commonly used types
pub use types::BackendError;

/// Convenience alias used throughout the backend
pub type Result<T> = std::result::Result<T, BackendError>;
