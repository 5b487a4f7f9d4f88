use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::StatusCode,
};
use madrasa_core::AppError;
use madrasa_models::{
    CreateServicePlanDto, MediaUpdateResponse, PaginatedServicePlansResponse, ServicePlan,
    ServicePlanFilterParams, UpdateServicePlanDto,
};
use uuid::Uuid;

use crate::modules::media::MediaForm;
use crate::state::AppState;
use crate::validator::ValidatedJson;

use super::service::ServicePlanService;

#[utoipa::path(
    post,
    path = "/api/schools/{school_id}/service-plans",
    params(("school_id" = Uuid, Path, description = "School ID")),
    request_body = CreateServicePlanDto,
    responses(
        (status = 201, description = "Service plan created successfully", body = ServicePlan),
        (status = 400, description = "Invalid service plan data"),
        (status = 404, description = "School not found"),
        (status = 422, description = "Validation failed")
    ),
    tag = "Service Plans"
)]
pub async fn create_service_plan(
    State(state): State<AppState>,
    Path(school_id): Path<Uuid>,
    ValidatedJson(dto): ValidatedJson<CreateServicePlanDto>,
) -> Result<(StatusCode, Json<ServicePlan>), AppError> {
    let plan = ServicePlanService::create_service_plan(&state.db, school_id, dto).await?;
    Ok((StatusCode::CREATED, Json(plan)))
}

#[utoipa::path(
    get,
    path = "/api/schools/{school_id}/service-plans",
    params(
        ("school_id" = Uuid, Path, description = "School ID"),
        ("name" = Option<String>, Query, description = "Filter by name (partial match)"),
        ("limit" = Option<i64>, Query, description = "Limit number of results"),
        ("offset" = Option<i64>, Query, description = "Offset for pagination"),
        ("page" = Option<i64>, Query, description = "Page number, overrides offset")
    ),
    responses(
        (status = 200, description = "Paginated list of service plans", body = PaginatedServicePlansResponse),
        (status = 404, description = "School not found")
    ),
    tag = "Service Plans"
)]
pub async fn get_service_plans(
    State(state): State<AppState>,
    Path(school_id): Path<Uuid>,
    filters: Result<Query<ServicePlanFilterParams>, QueryRejection>,
) -> Result<Json<PaginatedServicePlansResponse>, AppError> {
    let Query(filters) = filters
        .map_err(|e| AppError::bad_request(anyhow::anyhow!("Invalid query parameters: {}", e)))?;
    let plans =
        ServicePlanService::get_service_plans(&state.db, school_id, filters).await?;
    Ok(Json(plans))
}

#[utoipa::path(
    get,
    path = "/api/schools/{school_id}/service-plans/{id}",
    params(
        ("school_id" = Uuid, Path, description = "School ID"),
        ("id" = Uuid, Path, description = "Service plan ID")
    ),
    responses(
        (status = 200, description = "Service plan details", body = ServicePlan),
        (status = 404, description = "Service plan not found")
    ),
    tag = "Service Plans"
)]
pub async fn get_service_plan(
    State(state): State<AppState>,
    Path((school_id, id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ServicePlan>, AppError> {
    let plan = ServicePlanService::get_service_plan(&state.db, school_id, id).await?;
    Ok(Json(plan))
}

#[utoipa::path(
    patch,
    path = "/api/schools/{school_id}/service-plans/{id}",
    params(
        ("school_id" = Uuid, Path, description = "School ID"),
        ("id" = Uuid, Path, description = "Service plan ID")
    ),
    request_body(
        content = UpdateServicePlanDto,
        description = "JSON or multipart/form-data; image as a file part or image_url with optional image_object_key"
    ),
    responses(
        (status = 200, description = "Service plan updated; media receipts included", body = MediaUpdateResponse<ServicePlan>),
        (status = 400, description = "Invalid media input or unresolvable URL"),
        (status = 404, description = "Service plan not found"),
        (status = 409, description = "The image changed concurrently"),
        (status = 413, description = "File too large"),
        (status = 502, description = "Object storage upload failed")
    ),
    tag = "Service Plans"
)]
pub async fn update_service_plan(
    State(state): State<AppState>,
    Path((school_id, id)): Path<(Uuid, Uuid)>,
    form: MediaForm<UpdateServicePlanDto>,
) -> Result<Json<MediaUpdateResponse<ServicePlan>>, AppError> {
    let response = ServicePlanService::update_service_plan(&state, school_id, id, form).await?;
    Ok(Json(response))
}

#[utoipa::path(
    delete,
    path = "/api/schools/{school_id}/service-plans/{id}",
    params(
        ("school_id" = Uuid, Path, description = "School ID"),
        ("id" = Uuid, Path, description = "Service plan ID")
    ),
    responses(
        (status = 204, description = "Service plan deleted"),
        (status = 404, description = "Service plan not found")
    ),
    tag = "Service Plans"
)]
pub async fn delete_service_plan(
    State(state): State<AppState>,
    Path((school_id, id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    ServicePlanService::delete_service_plan(&state, school_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/api/schools/{school_id}/service-plans/{id}/media/{slot}",
    params(
        ("school_id" = Uuid, Path, description = "School ID"),
        ("id" = Uuid, Path, description = "Service plan ID"),
        ("slot" = String, Path, description = "image")
    ),
    responses(
        (status = 200, description = "Image cleared", body = MediaUpdateResponse<ServicePlan>),
        (status = 404, description = "Service plan or slot not found"),
        (status = 409, description = "The image changed concurrently")
    ),
    tag = "Service Plans"
)]
pub async fn clear_service_plan_media(
    State(state): State<AppState>,
    Path((school_id, id, slot)): Path<(Uuid, Uuid, String)>,
) -> Result<Json<MediaUpdateResponse<ServicePlan>>, AppError> {
    let response =
        ServicePlanService::clear_service_plan_media(&state, school_id, id, &slot).await?;
    Ok(Json(response))
}
