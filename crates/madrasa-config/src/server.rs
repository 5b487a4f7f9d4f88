use crate::env_util::{parse_or, string_or};

/// Process-level server settings.
///
/// # Environment Variables
///
/// - `SERVER_ADDR`: bind address (default: `0.0.0.0:3000`)
/// - `DATABASE_URL`: PostgreSQL connection string (required at startup)
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `10`)
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub addr: String,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            addr: string_or("SERVER_ADDR", "0.0.0.0:3000"),
            database_url: std::env::var("DATABASE_URL").ok(),
            database_max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 10),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:3000".to_string(),
            database_url: None,
            database_max_connections: 10,
        }
    }
}
