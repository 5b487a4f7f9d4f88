use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::StatusCode,
};
use madrasa_core::AppError;
use madrasa_models::{
    CreateSchoolDto, MediaUpdateResponse, PaginatedSchoolsResponse, School, SchoolFilterParams,
    UpdateSchoolDto,
};
use uuid::Uuid;

use crate::modules::media::MediaForm;
use crate::state::AppState;
use crate::validator::ValidatedJson;

use super::service::SchoolService;

#[utoipa::path(
    post,
    path = "/api/schools",
    request_body = CreateSchoolDto,
    responses(
        (status = 201, description = "School created successfully", body = School),
        (status = 400, description = "School name already exists"),
        (status = 422, description = "Validation failed")
    ),
    tag = "Schools"
)]
pub async fn create_school(
    State(state): State<AppState>,
    ValidatedJson(dto): ValidatedJson<CreateSchoolDto>,
) -> Result<(StatusCode, Json<School>), AppError> {
    let school = SchoolService::create_school(&state.db, dto).await?;
    Ok((StatusCode::CREATED, Json(school)))
}

#[utoipa::path(
    get,
    path = "/api/schools",
    params(
        ("name" = Option<String>, Query, description = "Filter by school name (partial match)"),
        ("limit" = Option<i64>, Query, description = "Limit number of results"),
        ("offset" = Option<i64>, Query, description = "Offset for pagination"),
        ("page" = Option<i64>, Query, description = "Page number, overrides offset")
    ),
    responses(
        (status = 200, description = "Paginated list of schools", body = PaginatedSchoolsResponse),
        (status = 400, description = "Invalid query parameters")
    ),
    tag = "Schools"
)]
pub async fn get_all_schools(
    State(state): State<AppState>,
    filters: Result<Query<SchoolFilterParams>, QueryRejection>,
) -> Result<Json<PaginatedSchoolsResponse>, AppError> {
    let Query(filters) = filters
        .map_err(|e| AppError::bad_request(anyhow::anyhow!("Invalid query parameters: {}", e)))?;

    let schools = SchoolService::get_all_schools(&state.db, filters).await?;
    Ok(Json(schools))
}

#[utoipa::path(
    get,
    path = "/api/schools/{school_id}",
    params(
        ("school_id" = Uuid, Path, description = "School ID")
    ),
    responses(
        (status = 200, description = "School details", body = School),
        (status = 404, description = "School not found")
    ),
    tag = "Schools"
)]
pub async fn get_school(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<School>, AppError> {
    let school = SchoolService::get_school_by_id(&state.db, id).await?;
    Ok(Json(school))
}

#[utoipa::path(
    patch,
    path = "/api/schools/{school_id}",
    params(
        ("school_id" = Uuid, Path, description = "School ID")
    ),
    request_body(
        content = UpdateSchoolDto,
        description = "JSON or multipart/form-data. Per slot (icon, logo, background): a file part named after the slot, or {slot}_url with optional {slot}_object_key"
    ),
    responses(
        (status = 200, description = "School updated; media receipts included", body = MediaUpdateResponse<School>),
        (status = 400, description = "Invalid media input or unresolvable URL"),
        (status = 404, description = "School not found"),
        (status = 409, description = "A media slot changed concurrently"),
        (status = 413, description = "File too large"),
        (status = 422, description = "Validation failed"),
        (status = 502, description = "Object storage upload failed")
    ),
    tag = "Schools"
)]
pub async fn update_school(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    form: MediaForm<UpdateSchoolDto>,
) -> Result<Json<MediaUpdateResponse<School>>, AppError> {
    let response = SchoolService::update_school(&state, id, form).await?;
    Ok(Json(response))
}

#[utoipa::path(
    delete,
    path = "/api/schools/{school_id}",
    params(
        ("school_id" = Uuid, Path, description = "School ID")
    ),
    responses(
        (status = 204, description = "School and everything it owns deleted"),
        (status = 404, description = "School not found")
    ),
    tag = "Schools"
)]
pub async fn delete_school(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    SchoolService::delete_school(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/api/schools/{school_id}/media/{slot}",
    params(
        ("school_id" = Uuid, Path, description = "School ID"),
        ("slot" = String, Path, description = "icon, logo or background")
    ),
    responses(
        (status = 200, description = "Slot cleared; the previous asset is kept for the retention window", body = MediaUpdateResponse<School>),
        (status = 404, description = "School or slot not found"),
        (status = 409, description = "The slot changed concurrently")
    ),
    tag = "Schools"
)]
pub async fn clear_school_media(
    State(state): State<AppState>,
    Path((id, slot)): Path<(Uuid, String)>,
) -> Result<Json<MediaUpdateResponse<School>>, AppError> {
    let response = SchoolService::clear_school_media(&state, id, &slot).await?;
    Ok(Json(response))
}
