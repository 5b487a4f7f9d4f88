use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::StatusCode,
};
use madrasa_core::AppError;
use madrasa_models::{
    CreatePostDto, MediaUpdateResponse, PaginatedPostsResponse, Post,
    PostFilterParams, UpdatePostDto,
};
use uuid::Uuid;

use crate::modules::media::MediaForm;
use crate::state::AppState;
use crate::validator::ValidatedJson;

use super::service::PostService;

#[utoipa::path(
    post,
    path = "/api/schools/{school_id}/posts",
    params(("school_id" = Uuid, Path, description = "School ID")),
    request_body = CreatePostDto,
    responses(
        (status = 201, description = "Post created successfully", body = Post),
        (status = 404, description = "School not found"),
        (status = 422, description = "Validation failed")
    ),
    tag = "Posts"
)]
pub async fn create_post(
    State(state): State<AppState>,
    Path(school_id): Path<Uuid>,
    ValidatedJson(dto): ValidatedJson<CreatePostDto>,
) -> Result<(StatusCode, Json<Post>), AppError> {
    let post = PostService::create_post(&state.db, school_id, dto).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

#[utoipa::path(
    get,
    path = "/api/schools/{school_id}/posts",
    params(
        ("school_id" = Uuid, Path, description = "School ID"),
        ("title" = Option<String>, Query, description = "Filter by title (partial match)"),
        ("published" = Option<bool>, Query, description = "Only published or only draft posts"),
        ("limit" = Option<i64>, Query, description = "Limit number of results"),
        ("offset" = Option<i64>, Query, description = "Offset for pagination"),
        ("page" = Option<i64>, Query, description = "Page number, overrides offset")
    ),
    responses(
        (status = 200, description = "Paginated list of posts", body = PaginatedPostsResponse),
        (status = 404, description = "School not found")
    ),
    tag = "Posts"
)]
pub async fn get_posts(
    State(state): State<AppState>,
    Path(school_id): Path<Uuid>,
    filters: Result<Query<PostFilterParams>, QueryRejection>,
) -> Result<Json<PaginatedPostsResponse>, AppError> {
    let Query(filters) = filters
        .map_err(|e| AppError::bad_request(anyhow::anyhow!("Invalid query parameters: {}", e)))?;
    let posts = PostService::get_posts(&state.db, school_id, filters).await?;
    Ok(Json(posts))
}

#[utoipa::path(
    get,
    path = "/api/schools/{school_id}/posts/{id}",
    params(
        ("school_id" = Uuid, Path, description = "School ID"),
        ("id" = Uuid, Path, description = "Post ID")
    ),
    responses(
        (status = 200, description = "Post details", body = Post),
        (status = 404, description = "Post not found")
    ),
    tag = "Posts"
)]
pub async fn get_post(
    State(state): State<AppState>,
    Path((school_id, id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Post>, AppError> {
    let post = PostService::get_post(&state.db, school_id, id).await?;
    Ok(Json(post))
}

#[utoipa::path(
    patch,
    path = "/api/schools/{school_id}/posts/{id}",
    params(
        ("school_id" = Uuid, Path, description = "School ID"),
        ("id" = Uuid, Path, description = "Post ID")
    ),
    request_body(
        content = UpdatePostDto,
        description = "JSON or multipart/form-data; image as a file part or image_url with optional image_object_key"
    ),
    responses(
        (status = 200, description = "Post updated; media receipts included", body = MediaUpdateResponse<Post>),
        (status = 400, description = "Invalid media input or unresolvable URL"),
        (status = 404, description = "Post not found"),
        (status = 409, description = "The image changed concurrently"),
        (status = 413, description = "File too large"),
        (status = 502, description = "Object storage upload failed")
    ),
    tag = "Posts"
)]
pub async fn update_post(
    State(state): State<AppState>,
    Path((school_id, id)): Path<(Uuid, Uuid)>,
    form: MediaForm<UpdatePostDto>,
) -> Result<Json<MediaUpdateResponse<Post>>, AppError> {
    let response = PostService::update_post(&state, school_id, id, form).await?;
    Ok(Json(response))
}

#[utoipa::path(
    delete,
    path = "/api/schools/{school_id}/posts/{id}",
    params(
        ("school_id" = Uuid, Path, description = "School ID"),
        ("id" = Uuid, Path, description = "Post ID")
    ),
    responses(
        (status = 204, description = "Post deleted"),
        (status = 404, description = "Post not found")
    ),
    tag = "Posts"
)]
pub async fn delete_post(
    State(state): State<AppState>,
    Path((school_id, id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    PostService::delete_post(&state, school_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/api/schools/{school_id}/posts/{id}/media/{slot}",
    params(
        ("school_id" = Uuid, Path, description = "School ID"),
        ("id" = Uuid, Path, description = "Post ID"),
        ("slot" = String, Path, description = "image")
    ),
    responses(
        (status = 200, description = "Image cleared", body = MediaUpdateResponse<Post>),
        (status = 404, description = "Post or slot not found"),
        (status = 409, description = "The image changed concurrently")
    ),
    tag = "Posts"
)]
pub async fn clear_post_media(
    State(state): State<AppState>,
    Path((school_id, id, slot)): Path<(Uuid, Uuid, String)>,
) -> Result<Json<MediaUpdateResponse<Post>>, AppError> {
    let response = PostService::clear_post_media(&state, school_id, id, &slot).await?;
    Ok(Json(response))
}
