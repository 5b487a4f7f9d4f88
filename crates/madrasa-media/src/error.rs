use std::time::Duration;

use madrasa_core::{AppError, StorageError};

use crate::resolver::NotResolvable;
use crate::slot::SlotStateError;

/// Errors surfaced by the media lifecycle.
///
/// Side-effect failures (trash moves, deletions) are never errors here; they
/// are logged and reported on the receipt.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("upload failed: {0}")]
    UploadFailed(#[source] StorageError),

    #[error("upload did not complete within {0:?}")]
    UploadTimedOut(Duration),

    #[error(transparent)]
    NotResolvable(#[from] NotResolvable),

    #[error("failed to load slot state: {0}")]
    LoadFailed(#[source] StoreError),

    #[error("failed to persist slot state: {0}")]
    PersistFailed(#[source] StoreError),

    #[error("{0} was modified concurrently, retry the request")]
    Conflict(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid media request: {0}")]
    InvalidRequest(String),

    #[error("retention window must not be negative")]
    NegativeRetention,
}

impl MediaError {
    /// HTTP mapping used by the API layer.
    pub fn into_app_error(self) -> AppError {
        match self {
            MediaError::UploadFailed(StorageError::InvalidFileSize { .. }) => {
                AppError::payload_too_large(self)
            }
            MediaError::UploadFailed(
                StorageError::InvalidMimeType { .. } | StorageError::InvalidKey(_),
            ) => AppError::bad_request(self),
            MediaError::UploadFailed(_) | MediaError::UploadTimedOut(_) => {
                AppError::bad_gateway(self)
            }
            MediaError::NotResolvable(_) | MediaError::InvalidRequest(_) => {
                AppError::bad_request(self)
            }
            MediaError::Conflict(_) => AppError::conflict(self),
            MediaError::NotFound(_) => AppError::not_found(self),
            MediaError::LoadFailed(_)
            | MediaError::PersistFailed(_)
            | MediaError::NegativeRetention => AppError::internal(self),
        }
    }
}

/// Errors from a [`crate::store::SlotStore`] backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("slot store backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("stored slot state is inconsistent: {0}")]
    Corrupt(#[from] SlotStateError),

    #[error("slot {0} is not registered")]
    UnknownSlot(String),

    #[error("slot {0} is school-scoped but no school was given")]
    MissingTenant(String),
}

impl StoreError {
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StoreError::Backend(Box::new(err))
    }
}
