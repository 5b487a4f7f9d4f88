use madrasa_core::{PaginationMeta, PaginationParams};
use madrasa_models::{
    CreatePostDto, CreateSchoolDto, CreateServicePlanDto, CreateSubjectDto, DueAssetView,
    DueAssetsResponse, PaginatedPostsResponse, PaginatedSchoolsResponse,
    PaginatedServicePlansResponse, PaginatedSubjectsResponse, Post, PostFilterParams, School,
    SchoolFilterParams, ServicePlan, ServicePlanFilterParams, SlotReceipt, Subject,
    SubjectFilterParams, SweepResponse, UpdatePostDto, UpdateSchoolDto, UpdateServicePlanDto,
    UpdateSubjectDto,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::schools::controller::create_school,
        crate::modules::schools::controller::get_all_schools,
        crate::modules::schools::controller::get_school,
        crate::modules::schools::controller::update_school,
        crate::modules::schools::controller::delete_school,
        crate::modules::schools::controller::clear_school_media,
        crate::modules::subjects::controller::create_subject,
        crate::modules::subjects::controller::get_subjects,
        crate::modules::subjects::controller::get_subject,
        crate::modules::subjects::controller::update_subject,
        crate::modules::subjects::controller::delete_subject,
        crate::modules::subjects::controller::clear_subject_media,
        crate::modules::posts::controller::create_post,
        crate::modules::posts::controller::get_posts,
        crate::modules::posts::controller::get_post,
        crate::modules::posts::controller::update_post,
        crate::modules::posts::controller::delete_post,
        crate::modules::posts::controller::clear_post_media,
        crate::modules::service_plans::controller::create_service_plan,
        crate::modules::service_plans::controller::get_service_plans,
        crate::modules::service_plans::controller::get_service_plan,
        crate::modules::service_plans::controller::update_service_plan,
        crate::modules::service_plans::controller::delete_service_plan,
        crate::modules::service_plans::controller::clear_service_plan_media,
        crate::modules::media::controller::list_due_assets,
        crate::modules::media::controller::run_sweep,
    ),
    components(
        schemas(
            School,
            CreateSchoolDto,
            UpdateSchoolDto,
            SchoolFilterParams,
            PaginatedSchoolsResponse,
            Subject,
            CreateSubjectDto,
            UpdateSubjectDto,
            SubjectFilterParams,
            PaginatedSubjectsResponse,
            Post,
            CreatePostDto,
            UpdatePostDto,
            PostFilterParams,
            PaginatedPostsResponse,
            ServicePlan,
            CreateServicePlanDto,
            UpdateServicePlanDto,
            ServicePlanFilterParams,
            PaginatedServicePlansResponse,
            SlotReceipt,
            DueAssetView,
            DueAssetsResponse,
            SweepResponse,
            PaginationMeta,
            PaginationParams,
        )
    ),
    tags(
        (name = "Schools", description = "School management with icon, logo and background images"),
        (name = "Subjects", description = "Subjects offered by a school"),
        (name = "Posts", description = "School news and announcements"),
        (name = "Service Plans", description = "Paid plans offered by a school"),
        (name = "Media", description = "Retention of replaced images")
    ),
    info(
        title = "Madrasa API",
        version = "0.1.0",
        description = "REST API for schools and mosques built with Rust, Axum, and PostgreSQL. Replaced images are kept for a retention window before they are deleted.",
        license(
            name = "MIT"
        )
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_media_routes() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        assert!(paths.contains_key("/api/schools/{school_id}/media/{slot}"));
        assert!(paths.contains_key("/api/schools/{school_id}/posts/{id}/media/{slot}"));
        assert!(paths.contains_key("/api/media/due"));
        assert!(paths.contains_key("/api/media/sweep"));
    }
}
