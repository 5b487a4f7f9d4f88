//! Madrasa Media
//!
//! Every entity that displays an image owns one or more *slots*. A slot holds
//! the asset currently shown (`current`) and, for a retention window after it
//! was displaced, the asset shown before it (`old`). This crate owns the
//! rules for moving assets between those two positions and the background
//! process that reclaims old assets once their window expires.
//!
//! - [`slot`]: slot state and the column layout it is persisted in
//! - [`transition`]: the pure state transition for a replace or clear
//! - [`resolver`]: deriving object keys from URLs
//! - [`store`]: the persistence port for slot state
//! - [`replacement`]: orchestration of upload, transition, persist, side effects
//! - [`sweeper`]: periodic reclamation of expired old assets
//!
//! Storage is reached only through [`madrasa_core::ObjectStorage`] and the
//! database only through [`store::SlotStore`], so the whole lifecycle can be
//! exercised against the in-memory doubles in `memory` (feature
//! `test-utils`).

pub mod clock;
pub mod error;
pub mod replacement;
pub mod resolver;
pub mod slot;
pub mod store;
pub mod sweeper;
pub mod transition;

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{MediaError, StoreError};
pub use replacement::{
    AssetReplacementService, ExplicitAsset, PreparedSlot, ReplacementPolicy, ReplacementReceipt,
    SideEffectFailure, SlotChange,
};
pub use resolver::{KeyStrategy, NotResolvable, ObjectKeyResolver};
pub use slot::{AssetPointer, RetainedAsset, SlotColumns, SlotRef, SlotState, SlotTarget};
pub use store::{DueAsset, SlotStore, StoreFuture};
pub use sweeper::{RetentionSweeper, SweepReport};
pub use transition::{Intent, Outcome, Retention, SideEffect, Transition};
