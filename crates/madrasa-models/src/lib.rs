//! # Madrasa Models
//!
//! Entity rows, request DTOs and response types for the slot-bearing
//! entities: schools, subjects, posts and service plans.
//!
//! - [`ids`]: strongly-typed entity IDs
//! - [`slots`]: the registry of media slot columns and row accessors
//! - [`media`]: per-slot receipts returned by update endpoints

pub mod ids;
pub mod media;
pub mod posts;
pub mod schools;
pub mod service_plans;
pub mod slots;
pub mod subjects;

pub use ids::{PostId, SchoolId, ServicePlanId, SubjectId};
pub use media::{DueAssetView, DueAssetsResponse, MediaUpdateResponse, SlotReceipt, SweepResponse};
pub use posts::{CreatePostDto, PaginatedPostsResponse, Post, PostFilterParams, UpdatePostDto};
pub use schools::{
    CreateSchoolDto, PaginatedSchoolsResponse, School, SchoolFilterParams, UpdateSchoolDto,
};
pub use service_plans::{
    CreateServicePlanDto, PaginatedServicePlansResponse, ServicePlan, ServicePlanFilterParams,
    UpdateServicePlanDto,
};
pub use slots::HasSlots;
pub use subjects::{
    CreateSubjectDto, PaginatedSubjectsResponse, Subject, SubjectFilterParams, UpdateSubjectDto,
};
