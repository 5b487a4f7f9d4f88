//! # Madrasa API
//!
//! REST backend for schools and mosques. Schools own subjects, posts and
//! service plans; each of these carries one or more image *slots*.
//!
//! ## Media slots
//!
//! A slot stores the image currently shown and, for a retention window after
//! it is replaced, the image shown before it. Replacing an image never
//! deletes the previous one outright: it is moved to the storage trash and
//! recorded in the slot's `*_url_old` / `*_object_key_old` columns with a
//! `*_delete_pending_until` deadline. A background sweeper deletes old assets
//! once that deadline passes. The lifecycle rules live in
//! [`madrasa_media`]; this crate wires them to HTTP.
//!
//! ```text
//! src/
//! ├── modules/
//! │   ├── media/           # multipart/JSON media form, bundled updates, sweep endpoints
//! │   ├── schools/         # icon, logo and background slots
//! │   ├── subjects/        # image slot, nested under a school
//! │   ├── posts/           # image slot, nested under a school
//! │   └── service_plans/   # image slot, nested under a school
//! ├── docs.rs              # OpenAPI document
//! ├── router.rs            # main router
//! ├── state.rs             # shared application state
//! └── validator.rs         # validated JSON extractor
//! ```
//!
//! Each feature module has a `controller.rs` (handlers), `service.rs`
//! (queries) and `router.rs`.
//!
//! ## API documentation
//!
//! - Swagger UI: `http://localhost:3000/swagger-ui`
//! - Scalar: `http://localhost:3000/scalar`

pub mod docs;
pub mod modules;
pub mod router;
pub mod state;
pub mod validator;

// Re-export workspace crates for convenience
pub use madrasa_config;
pub use madrasa_core;
pub use madrasa_db;
pub use madrasa_media;
pub use madrasa_models;
