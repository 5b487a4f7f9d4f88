//! # Madrasa Core
//!
//! Core types, errors, and utilities for the Madrasa API.
//!
//! This crate provides foundational types used throughout the application:
//!
//! - [`errors`]: Application error type with HTTP response conversion
//! - [`file_storage`]: Object storage collaborator trait and the local filesystem backend
//! - [`object_url`]: Parsing of public and signed object URLs back into bucket/key pairs
//! - [`pagination`]: Pagination utilities for API responses
//! - [`serde`]: Custom serde deserialization helpers for form and query input
//!
//! # Example
//!
//! ```ignore
//! use madrasa_core::errors::AppError;
//! use madrasa_core::pagination::{PaginationParams, PaginationMeta};
//!
//! let error = AppError::not_found(anyhow::anyhow!("School not found"));
//!
//! let params = PaginationParams::default();
//! let limit = params.limit();
//! ```

pub mod errors;
pub mod file_storage;
pub mod object_url;
pub mod pagination;
pub mod serde;

// Re-export commonly used types at crate root
pub use errors::AppError;
pub use file_storage::{
    LocalObjectStorage, ObjectStorage, StorageError, StorageFuture, StoredObject, UploadedFile,
};
pub use pagination::{PaginationMeta, PaginationParams};
