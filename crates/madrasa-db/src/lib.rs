//! # Madrasa DB
//!
//! PostgreSQL connection pool construction for the Madrasa API, and the
//! [`PgSlotStore`] that persists media slot state in the entity tables.
//!
//! # Example
//!
//! ```ignore
//! use madrasa_config::ServerConfig;
//! use madrasa_db::init_db_pool;
//!
//! let pool = init_db_pool(&ServerConfig::from_env()).await?;
//! ```

mod slot_sql;
mod slot_store;

use std::time::Duration;

use madrasa_config::ServerConfig;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

// Re-export PgPool for convenience
pub use slot_sql::{push_row_filter, push_slot_assignments, push_slot_guard};
pub use slot_store::PgSlotStore;
pub use sqlx::PgPool;

/// Error raised while building the pool.
#[derive(Debug)]
pub enum PoolError {
    /// `DATABASE_URL` was not set.
    MissingUrl,
    Connect(sqlx::Error),
}

impl std::fmt::Display for PoolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingUrl => write!(f, "DATABASE_URL must be set"),
            Self::Connect(e) => write!(f, "Failed to connect to database: {}", e),
        }
    }
}

impl std::error::Error for PoolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Connect(e) => Some(e),
            Self::MissingUrl => None,
        }
    }
}

/// Initializes a PostgreSQL connection pool from server configuration.
///
/// The returned pool is cheaply cloneable and should be shared through
/// application state.
pub async fn init_db_pool(config: &ServerConfig) -> Result<PgPool, PoolError> {
    let database_url = config.database_url.as_deref().ok_or(PoolError::MissingUrl)?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await
        .map_err(PoolError::Connect)?;

    info!(
        max_connections = config.database_max_connections,
        "Database pool initialized"
    );

    Ok(pool)
}
