use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::StatusCode,
};
use madrasa_core::AppError;
use madrasa_models::{
    CreateSubjectDto, MediaUpdateResponse, PaginatedSubjectsResponse, Subject,
    SubjectFilterParams, UpdateSubjectDto,
};
use uuid::Uuid;

use crate::modules::media::MediaForm;
use crate::state::AppState;
use crate::validator::ValidatedJson;

use super::service::SubjectService;

#[utoipa::path(
    post,
    path = "/api/schools/{school_id}/subjects",
    params(("school_id" = Uuid, Path, description = "School ID")),
    request_body = CreateSubjectDto,
    responses(
        (status = 201, description = "Subject created successfully", body = Subject),
        (status = 400, description = "Subject code already exists in this school"),
        (status = 404, description = "School not found"),
        (status = 422, description = "Validation failed")
    ),
    tag = "Subjects"
)]
pub async fn create_subject(
    State(state): State<AppState>,
    Path(school_id): Path<Uuid>,
    ValidatedJson(dto): ValidatedJson<CreateSubjectDto>,
) -> Result<(StatusCode, Json<Subject>), AppError> {
    let subject = SubjectService::create_subject(&state.db, school_id, dto).await?;
    Ok((StatusCode::CREATED, Json(subject)))
}

#[utoipa::path(
    get,
    path = "/api/schools/{school_id}/subjects",
    params(
        ("school_id" = Uuid, Path, description = "School ID"),
        ("name" = Option<String>, Query, description = "Filter by name (partial match)"),
        ("limit" = Option<i64>, Query, description = "Limit number of results"),
        ("offset" = Option<i64>, Query, description = "Offset for pagination"),
        ("page" = Option<i64>, Query, description = "Page number, overrides offset")
    ),
    responses(
        (status = 200, description = "Paginated list of subjects", body = PaginatedSubjectsResponse),
        (status = 404, description = "School not found")
    ),
    tag = "Subjects"
)]
pub async fn get_subjects(
    State(state): State<AppState>,
    Path(school_id): Path<Uuid>,
    filters: Result<Query<SubjectFilterParams>, QueryRejection>,
) -> Result<Json<PaginatedSubjectsResponse>, AppError> {
    let Query(filters) = filters
        .map_err(|e| AppError::bad_request(anyhow::anyhow!("Invalid query parameters: {}", e)))?;
    let subjects = SubjectService::get_subjects(&state.db, school_id, filters).await?;
    Ok(Json(subjects))
}

#[utoipa::path(
    get,
    path = "/api/schools/{school_id}/subjects/{id}",
    params(
        ("school_id" = Uuid, Path, description = "School ID"),
        ("id" = Uuid, Path, description = "Subject ID")
    ),
    responses(
        (status = 200, description = "Subject details", body = Subject),
        (status = 404, description = "Subject not found")
    ),
    tag = "Subjects"
)]
pub async fn get_subject(
    State(state): State<AppState>,
    Path((school_id, id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Subject>, AppError> {
    let subject = SubjectService::get_subject(&state.db, school_id, id).await?;
    Ok(Json(subject))
}

#[utoipa::path(
    patch,
    path = "/api/schools/{school_id}/subjects/{id}",
    params(
        ("school_id" = Uuid, Path, description = "School ID"),
        ("id" = Uuid, Path, description = "Subject ID")
    ),
    request_body(
        content = UpdateSubjectDto,
        description = "JSON or multipart/form-data; image as a file part or image_url with optional image_object_key"
    ),
    responses(
        (status = 200, description = "Subject updated; media receipts included", body = MediaUpdateResponse<Subject>),
        (status = 400, description = "Invalid media input or unresolvable URL"),
        (status = 404, description = "Subject not found"),
        (status = 409, description = "The image changed concurrently"),
        (status = 413, description = "File too large"),
        (status = 502, description = "Object storage upload failed")
    ),
    tag = "Subjects"
)]
pub async fn update_subject(
    State(state): State<AppState>,
    Path((school_id, id)): Path<(Uuid, Uuid)>,
    form: MediaForm<UpdateSubjectDto>,
) -> Result<Json<MediaUpdateResponse<Subject>>, AppError> {
    let response = SubjectService::update_subject(&state, school_id, id, form).await?;
    Ok(Json(response))
}

#[utoipa::path(
    delete,
    path = "/api/schools/{school_id}/subjects/{id}",
    params(
        ("school_id" = Uuid, Path, description = "School ID"),
        ("id" = Uuid, Path, description = "Subject ID")
    ),
    responses(
        (status = 204, description = "Subject deleted"),
        (status = 404, description = "Subject not found")
    ),
    tag = "Subjects"
)]
pub async fn delete_subject(
    State(state): State<AppState>,
    Path((school_id, id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    SubjectService::delete_subject(&state, school_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/api/schools/{school_id}/subjects/{id}/media/{slot}",
    params(
        ("school_id" = Uuid, Path, description = "School ID"),
        ("id" = Uuid, Path, description = "Subject ID"),
        ("slot" = String, Path, description = "image")
    ),
    responses(
        (status = 200, description = "Image cleared", body = MediaUpdateResponse<Subject>),
        (status = 404, description = "Subject or slot not found"),
        (status = 409, description = "The image changed concurrently")
    ),
    tag = "Subjects"
)]
pub async fn clear_subject_media(
    State(state): State<AppState>,
    Path((school_id, id, slot)): Path<(Uuid, Uuid, String)>,
) -> Result<Json<MediaUpdateResponse<Subject>>, AppError> {
    let response = SubjectService::clear_subject_media(&state, school_id, id, &slot).await?;
    Ok(Json(response))
}
