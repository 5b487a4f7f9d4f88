//! Object storage abstraction layer.
//!
//! The media lifecycle talks to storage only through [`ObjectStorage`], so
//! backends (local filesystem, Supabase/S3-compatible services, in-memory
//! fakes) can be swapped without changing business logic.
//!
//! # Example
//!
//! ```ignore
//! use madrasa_core::file_storage::{LocalObjectStorage, ObjectStorage, UploadedFile};
//! use std::path::PathBuf;
//!
//! let storage = LocalObjectStorage::new(
//!     PathBuf::from("./storage/objects"),
//!     "http://localhost:3000".to_string(),
//!     "media".to_string(),
//! );
//!
//! let stored = storage.upload("schools/abc/logo", file).await?;
//! let trash_url = storage.move_to_trash(&stored.url, 30).await?;
//! ```

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::debug;

use crate::object_url::{self, PUBLIC_OBJECT_PATH, SIGNED_OBJECT_PATH};

/// Boxed future returned by [`ObjectStorage`] methods.
pub type StorageFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StorageError>> + Send + 'a>>;

/// Image MIME types accepted for media slots.
pub const ALLOWED_MIME_TYPES: &[&str] = &["image/png", "image/jpeg", "image/webp", "image/gif"];

/// Default per-file size cap: 5MB.
pub const DEFAULT_MAX_FILE_SIZE: usize = 5 * 1024 * 1024;

/// A file received from a client, not yet stored.
#[derive(Clone)]
pub struct UploadedFile {
    /// Original filename as sent by the client
    pub filename: Option<String>,
    /// MIME type of the content (e.g., "image/png")
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadedFile")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

impl UploadedFile {
    /// File extension derived from the MIME type, without the dot.
    pub fn extension(&self) -> &'static str {
        match self.content_type.as_str() {
            "image/png" => "png",
            "image/jpeg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "bin",
        }
    }

    /// First 16 hex characters of the SHA-256 of the content.
    pub fn content_digest(&self) -> String {
        let digest = Sha256::digest(&self.bytes);
        hex::encode(digest)[..16].to_string()
    }

    /// Object key under `key_prefix`, unique per upload instant and content.
    ///
    /// Keys are never reused across uploads, so a key that left a slot can
    /// be deleted without checking whether it came back.
    pub fn object_key(&self, key_prefix: &str, stamp_millis: i64) -> String {
        format!(
            "{}/{}-{}.{}",
            key_prefix.trim_matches('/'),
            stamp_millis,
            self.content_digest(),
            self.extension()
        )
    }
}

/// Location of a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Publicly resolvable URL
    pub url: String,
    /// Storage-layer key
    pub key: String,
}

/// Abstract trait for object storage backends.
pub trait ObjectStorage: Send + Sync {
    /// Store `file` under `key_prefix` and return its public URL and key.
    fn upload<'a>(&'a self, key_prefix: &'a str, file: UploadedFile)
    -> StorageFuture<'a, StoredObject>;

    /// Relocate the object behind `public_url` into the trash area.
    ///
    /// `retention_hint_days` tells the backend how long the trashed copy
    /// should be kept. Returns the public URL of the trashed copy.
    fn move_to_trash<'a>(
        &'a self,
        public_url: &'a str,
        retention_hint_days: u32,
    ) -> StorageFuture<'a, String>;

    /// Permanently delete an object. Deleting a missing object succeeds.
    fn delete<'a>(&'a self, object_key: &'a str) -> StorageFuture<'a, ()>;

    /// Parse a signed or otherwise backend-specific URL into an object key.
    fn parse_signed_url(&self, _url: &str) -> Option<String> {
        None
    }

    /// Public URL for an object key.
    fn public_url(&self, key: &str) -> Result<String, StorageError>;
}

/// Error type for object storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("File exceeds maximum size of {max_bytes} bytes")]
    InvalidFileSize { max_bytes: usize },

    #[error("MIME type '{received}' not allowed. Allowed types: {}", .allowed.join(", "))]
    InvalidMimeType {
        received: String,
        allowed: Vec<String>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Object not found")]
    NotFound,

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("URL does not point into this storage: {0}")]
    ForeignUrl(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Validate a storage key to prevent path traversal.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() || key.contains("..") || key.starts_with('/') || key.starts_with('\\') {
        return Err(StorageError::InvalidKey(
            "Key must not be empty, contain '..', or start with a separator".to_string(),
        ));
    }

    if !key
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '/' || c == '.')
    {
        return Err(StorageError::InvalidKey(
            "Key contains invalid characters".to_string(),
        ));
    }

    Ok(())
}

/// Validate size and MIME type of an incoming file.
pub fn validate_upload(file: &UploadedFile, max_file_size: usize) -> Result<(), StorageError> {
    if file.bytes.len() > max_file_size {
        return Err(StorageError::InvalidFileSize {
            max_bytes: max_file_size,
        });
    }

    if !ALLOWED_MIME_TYPES.contains(&file.content_type.as_str()) {
        return Err(StorageError::InvalidMimeType {
            received: file.content_type.clone(),
            allowed: ALLOWED_MIME_TYPES.iter().map(|s| s.to_string()).collect(),
        });
    }

    Ok(())
}

const TRASH_PREFIX: &str = ".trash";

fn unix_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// Local filesystem-based object storage.
///
/// Objects live at `{root}/{bucket}/{key}` and are served at
/// `{public_base_url}/storage/v1/object/public/{bucket}/{key}`.
#[derive(Clone, Debug)]
pub struct LocalObjectStorage {
    root: PathBuf,
    public_base_url: String,
    bucket: String,
    max_file_size: usize,
}

impl LocalObjectStorage {
    pub fn new(root: PathBuf, public_base_url: String, bucket: String) -> Self {
        Self::with_max_size(root, public_base_url, bucket, DEFAULT_MAX_FILE_SIZE)
    }

    pub fn with_max_size(
        root: PathBuf,
        public_base_url: String,
        bucket: String,
        max_file_size: usize,
    ) -> Self {
        Self {
            root,
            public_base_url,
            bucket,
            max_file_size,
        }
    }

    /// Directory served under `/storage/v1/object/public/{bucket}`.
    pub fn bucket_dir(&self) -> PathBuf {
        self.root.join(&self.bucket)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.bucket_dir().join(key))
    }

    fn key_from_url(&self, url: &str) -> Result<String, StorageError> {
        let location = object_url::parse_object_url(url, PUBLIC_OBJECT_PATH)
            .ok_or_else(|| StorageError::ForeignUrl(url.to_string()))?;
        if location.bucket != self.bucket {
            return Err(StorageError::ForeignUrl(url.to_string()));
        }
        Ok(location.key)
    }
}

impl ObjectStorage for LocalObjectStorage {
    fn upload<'a>(
        &'a self,
        key_prefix: &'a str,
        file: UploadedFile,
    ) -> StorageFuture<'a, StoredObject> {
        Box::pin(async move {
            validate_upload(&file, self.max_file_size)?;

            let key = file.object_key(key_prefix, unix_millis());
            let path = self.path_for(&key)?;

            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await?;
            }
            fs::write(&path, &file.bytes).await?;

            debug!(storage.key = %key, size = file.bytes.len(), "Object written");

            Ok(StoredObject {
                url: self.public_url(&key)?,
                key,
            })
        })
    }

    fn move_to_trash<'a>(
        &'a self,
        public_url: &'a str,
        retention_hint_days: u32,
    ) -> StorageFuture<'a, String> {
        Box::pin(async move {
            let key = self.key_from_url(public_url)?;
            let source = self.path_for(&key)?;

            if fs::metadata(&source).await.is_err() {
                return Err(StorageError::NotFound);
            }

            let trash_key = format!("{}/{}d/{}", TRASH_PREFIX, retention_hint_days, key);
            let destination = self.path_for(&trash_key)?;
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent).await?;
            }
            fs::rename(&source, &destination).await?;

            debug!(storage.key = %key, storage.trash_key = %trash_key, "Object moved to trash");

            self.public_url(&trash_key)
        })
    }

    fn delete<'a>(&'a self, object_key: &'a str) -> StorageFuture<'a, ()> {
        Box::pin(async move {
            let path = self.path_for(object_key)?;

            match fs::remove_file(&path).await {
                Ok(_) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            }
        })
    }

    fn parse_signed_url(&self, url: &str) -> Option<String> {
        if !object_url::has_token(url) {
            return None;
        }
        let location = object_url::parse_object_url(url, SIGNED_OBJECT_PATH)?;
        (location.bucket == self.bucket).then_some(location.key)
    }

    fn public_url(&self, key: &str) -> Result<String, StorageError> {
        validate_key(key)?;
        Ok(format!(
            "{}{}{}/{}",
            self.public_base_url.trim_end_matches('/'),
            PUBLIC_OBJECT_PATH,
            self.bucket,
            key
        ))
    }
}
