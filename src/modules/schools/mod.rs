pub mod controller;
pub mod router;
pub mod service;

pub use router::init_schools_router;
pub(crate) use service::ensure_school_exists;
