pub mod media;
pub mod posts;
pub mod schools;
pub mod service_plans;
pub mod subjects;
