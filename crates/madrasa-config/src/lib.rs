//! # Madrasa Config
//!
//! Configuration types for the Madrasa API, loaded from environment variables:
//!
//! - [`cors`]: CORS (Cross-Origin Resource Sharing) configuration
//! - [`media`]: Media slot retention, upload timeout, and sweeper cadence
//! - [`server`]: Bind address and database pool sizing
//! - [`storage`]: Local object storage location and public URL shape
//!
//! # Example
//!
//! ```ignore
//! use madrasa_config::{CorsConfig, MediaConfig, ServerConfig, StorageConfig};
//!
//! let media = MediaConfig::from_env();
//! let window = media.retention_window();
//! ```

pub mod cors;
pub mod media;
pub mod server;
pub mod storage;

mod env_util;

pub use cors::CorsConfig;
pub use media::MediaConfig;
pub use server::ServerConfig;
pub use storage::StorageConfig;
