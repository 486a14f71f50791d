//! Server Module
//!
//! Initialization and configuration of the Axum HTTP server.
//!
//! # Module Structure
//!
//! ```text
//! server/
//! ├── mod.rs          - Module exports and documentation
//! ├── state.rs        - AppState and FromRef implementations
//! ├── config.rs       - Configuration loading (store, push, port)
//! └── init.rs         - Server initialization and app creation
//! ```
//!
//! # Initialization Flow
//!
//! 1. **Configuration Loading**: Loads the store and push sink from
//!    environment variables
//! 2. **State Creation**: Creates the presence registry and room map
//! 3. **Router Creation**: Configures all routes
//! 4. **Background Tasks**: Starts the periodic room cleanup task

pub mod config;
pub mod init;
pub mod state;

pub use init::create_app;
pub use state::AppState;
