/**
 * Server Configuration
 *
 * This module handles loading and validation of server configuration:
 * the persistence backend and the push notification sink.
 *
 * # Configuration Sources
 *
 * Configuration is loaded from environment variables, with sensible
 * defaults for local development when possible.
 *
 * # Error Handling
 *
 * Configuration errors are logged but do not prevent server startup.
 * When Postgres is unavailable the server falls back to the in-memory
 * store, and when no push gateway is configured notifications are
 * logged instead of sent.
 */

use std::sync::Arc;

use sqlx::PgPool;

use crate::backend::persistence::{MemoryStore, PgStore, SharedStore};
use crate::backend::push::{HttpPush, LogPush, PushDispatcher};

/// Load the persistence backend.
///
/// This function:
/// 1. Reads `DATABASE_URL` from environment
/// 2. Creates a PostgreSQL connection pool
/// 3. Runs database migrations
///
/// Returns the in-memory store when `DATABASE_URL` is not set or the
/// connection fails, so the server always starts. In-memory state does
/// not survive a restart.
pub async fn load_store() -> SharedStore {
    let database_url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            tracing::warn!("DATABASE_URL not set. Using in-memory store.");
            return Arc::new(MemoryStore::new());
        }
    };

    tracing::info!("Connecting to database...");

    let pool = match PgPool::connect(&database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Failed to create database connection pool: {:?}", e);
            tracing::warn!("Falling back to in-memory store.");
            return Arc::new(MemoryStore::new());
        }
    };

    tracing::info!("Database connection pool created successfully");

    tracing::info!("Running database migrations...");
    match sqlx::migrate!().run(&pool).await {
        Ok(_) => tracing::info!("Database migrations completed successfully"),
        Err(e) => {
            tracing::error!("Failed to run database migrations: {}", e);
            // Continue anyway, migrations might have already been run
            tracing::warn!("Continuing without migrations - database might not be up to date");
        }
    }

    Arc::new(PgStore::new(pool))
}

/// Load the push sink and start its dispatch worker.
///
/// Uses the HTTP gateway named in `PUSH_GATEWAY_URL` when present,
/// otherwise a sink that only logs what it would have sent.
pub fn load_push() -> PushDispatcher {
    match std::env::var("PUSH_GATEWAY_URL") {
        Ok(url) => {
            tracing::info!("Push notifications via gateway at {}", url);
            PushDispatcher::spawn(Arc::new(HttpPush::new(url)))
        }
        Err(_) => {
            tracing::warn!("PUSH_GATEWAY_URL not set. Push notifications will be logged only.");
            PushDispatcher::spawn(Arc::new(LogPush))
        }
    }
}

/// Server listen port, `SERVER_PORT` with a 3000 default
pub fn server_port() -> u16 {
    std::env::var("SERVER_PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(3000)
}
