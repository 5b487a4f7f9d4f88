use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::StoreError;
use crate::slot::{AssetPointer, SlotState, SlotTarget};

/// Boxed future returned by [`SlotStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// An old asset whose retention deadline has passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DueAsset {
    pub target: SlotTarget,
    pub asset: AssetPointer,
    pub delete_pending_until: DateTime<Utc>,
}

impl DueAsset {
    /// Position of this asset in the due ordering.
    pub fn sort_key(&self) -> (DateTime<Utc>, &str) {
        (self.delete_pending_until, &self.asset.object_key)
    }
}

/// Persistence port for slot state.
///
/// Every write is conditional on what the caller last read, so concurrent
/// writers to the same slot cannot both win.
pub trait SlotStore: Send + Sync {
    /// `None` when the owning row does not exist.
    fn load<'a>(&'a self, target: &'a SlotTarget) -> StoreFuture<'a, Option<SlotState>>;

    /// Writes `next` if the slot still equals `expected`. Returns whether the
    /// write happened.
    fn persist<'a>(
        &'a self,
        target: &'a SlotTarget,
        expected: &'a SlotState,
        next: &'a SlotState,
    ) -> StoreFuture<'a, bool>;

    /// Points the old position at `relocated` if it still holds
    /// `expected_old_key`. The deadline is kept.
    fn relocate_old<'a>(
        &'a self,
        target: &'a SlotTarget,
        expected_old_key: &'a str,
        relocated: &'a AssetPointer,
    ) -> StoreFuture<'a, bool>;

    /// Old assets with `delete_pending_until <= now`, ordered by
    /// `(delete_pending_until, object_key)`.
    ///
    /// With `after` set, only assets ordered strictly after it are returned,
    /// so callers can page past items they could not reclaim.
    fn due<'a>(
        &'a self,
        now: DateTime<Utc>,
        after: Option<&'a DueAsset>,
        limit: usize,
    ) -> StoreFuture<'a, Vec<DueAsset>>;

    /// Empties the old position if it still holds `due.asset` and is still
    /// past its deadline at `now`.
    fn clear_old<'a>(&'a self, due: &'a DueAsset, now: DateTime<Utc>) -> StoreFuture<'a, bool>;
}
