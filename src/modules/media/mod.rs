//! Media plumbing shared by the entity modules, and the retention endpoints.

pub mod controller;
pub mod form;
pub mod router;
pub mod update;

pub use form::{MediaDto, MediaForm};
pub use update::{FieldValue, RowRef, clear_slot, purge_slots, slot_named, update_with_media};
