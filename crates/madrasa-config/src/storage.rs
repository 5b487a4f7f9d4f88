use std::path::PathBuf;

use crate::env_util::string_or;

/// Local object storage settings.
///
/// # Environment Variables
///
/// - `STORAGE_ROOT`: directory holding bucket directories (default: `./storage/objects`)
/// - `STORAGE_PUBLIC_BASE_URL`: scheme and host used in public URLs (default: `http://localhost:3000`)
/// - `STORAGE_BUCKET`: bucket name (default: `media`)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageConfig {
    pub root: PathBuf,
    pub public_base_url: String,
    pub bucket: String,
}

impl StorageConfig {
    pub fn from_env() -> Self {
        Self {
            root: PathBuf::from(string_or("STORAGE_ROOT", "./storage/objects")),
            public_base_url: string_or("STORAGE_PUBLIC_BASE_URL", "http://localhost:3000"),
            bucket: string_or("STORAGE_BUCKET", "media"),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./storage/objects"),
            public_base_url: "http://localhost:3000".to_string(),
            bucket: "media".to_string(),
        }
    }
}
