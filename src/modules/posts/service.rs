use anyhow::anyhow;
use madrasa_core::{AppError, PaginationMeta};
use madrasa_models::{
    CreatePostDto, MediaUpdateResponse, PaginatedPostsResponse, Post, PostFilterParams,
    UpdatePostDto,
};
use sqlx::PgPool;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::modules::media::{
    FieldValue, MediaDto, MediaForm, RowRef, clear_slot, purge_slots, slot_named,
    update_with_media,
};
use crate::modules::schools::ensure_school_exists;
use crate::state::AppState;

impl MediaDto for UpdatePostDto {
    type Entity = Post;
}

const TABLE: &str = "posts";

pub struct PostService;

impl PostService {
    #[instrument(skip(db, dto), fields(school.id = %school_id, db.operation = "INSERT", db.table = TABLE))]
    pub async fn create_post(
        db: &PgPool,
        school_id: Uuid,
        dto: CreatePostDto,
    ) -> Result<Post, AppError> {
        let post = sqlx::query_as::<_, Post>(
            "INSERT INTO posts (school_id, title, body, published)
             VALUES ($1, $2, $3, $4)
             RETURNING *",
        )
        .bind(school_id)
        .bind(&dto.title)
        .bind(&dto.body)
        .bind(dto.published)
        .fetch_one(db)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e
                && db_err.is_foreign_key_violation()
            {
                return AppError::not_found(anyhow!("School not found"));
            }
            error!(error = %e, "Database error creating post");
            AppError::from(e)
        })?;

        info!(post.id = %post.id, post.published = post.published, "Post created successfully");
        Ok(post)
    }

    #[instrument(skip(db, filters), fields(school.id = %school_id, db.operation = "SELECT", db.table = TABLE))]
    pub async fn get_posts(
        db: &PgPool,
        school_id: Uuid,
        filters: PostFilterParams,
    ) -> Result<PaginatedPostsResponse, AppError> {
        ensure_school_exists(db, school_id).await?;

        let limit = filters.pagination.limit();
        let offset = filters.pagination.offset();
        let title = filters.title.as_ref().map(|t| format!("%{}%", t));

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM posts
             WHERE school_id = $1
               AND ($2::text IS NULL OR title ILIKE $2)
               AND ($3::boolean IS NULL OR published = $3)",
        )
        .bind(school_id)
        .bind(&title)
        .bind(filters.published)
        .fetch_one(db)
        .await
        .map_err(|e| {
            error!(error = %e, "Database error counting posts");
            AppError::from(e)
        })?;

        let posts = sqlx::query_as::<_, Post>(
            "SELECT * FROM posts
             WHERE school_id = $1
               AND ($2::text IS NULL OR title ILIKE $2)
               AND ($3::boolean IS NULL OR published = $3)
             ORDER BY created_at DESC
             LIMIT $4 OFFSET $5",
        )
        .bind(school_id)
        .bind(&title)
        .bind(filters.published)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await
        .map_err(|e| {
            error!(error = %e, "Database error fetching posts");
            AppError::from(e)
        })?;

        debug!(total = %total, returned = %posts.len(), "Posts fetched");

        Ok(PaginatedPostsResponse {
            data: posts,
            meta: PaginationMeta::for_page(&filters.pagination, total),
        })
    }

    pub async fn get_post(db: &PgPool, school_id: Uuid, id: Uuid) -> Result<Post, AppError> {
        RowRef::scoped(TABLE, school_id, id)
            .select()
            .build_query_as::<Post>()
            .fetch_optional(db)
            .await?
            .ok_or_else(|| AppError::not_found(anyhow!("Post not found")))
    }

    #[instrument(skip(state, form), fields(school.id = %school_id, post.id = %id))]
    pub async fn update_post(
        state: &AppState,
        school_id: Uuid,
        id: Uuid,
        form: MediaForm<UpdatePostDto>,
    ) -> Result<MediaUpdateResponse<Post>, AppError> {
        let MediaForm { dto, changes } = form;

        let mut fields = Vec::new();
        if let Some(title) = dto.title {
            fields.push(("title", FieldValue::Text(Some(title))));
        }
        if let Some(body) = dto.body {
            fields.push(("body", FieldValue::Text(Some(body))));
        }
        if let Some(published) = dto.published {
            fields.push(("published", FieldValue::Bool(published)));
        }

        let row = RowRef::scoped(TABLE, school_id, id);
        let (post, media) = update_with_media::<Post>(state, row, fields, changes).await?;

        info!(post.id = %post.id, "Post updated successfully");
        Ok(MediaUpdateResponse::new(post, media))
    }

    #[instrument(skip(state), fields(school.id = %school_id, post.id = %id))]
    pub async fn clear_post_media(
        state: &AppState,
        school_id: Uuid,
        id: Uuid,
        slot: &str,
    ) -> Result<MediaUpdateResponse<Post>, AppError> {
        let slot = slot_named::<Post>(slot)?;
        let receipt = clear_slot(state, RowRef::scoped(TABLE, school_id, id), slot).await?;
        let post = Self::get_post(&state.db, school_id, id).await?;
        Ok(MediaUpdateResponse::new(post, vec![receipt]))
    }

    #[instrument(skip(state), fields(school.id = %school_id, post.id = %id, db.operation = "DELETE", db.table = TABLE))]
    pub async fn delete_post(state: &AppState, school_id: Uuid, id: Uuid) -> Result<(), AppError> {
        let row = RowRef::scoped(TABLE, school_id, id);
        let post = row
            .delete()
            .build_query_as::<Post>()
            .fetch_optional(&state.db)
            .await
            .map_err(|e| {
                error!(error = %e, "Database error deleting post");
                AppError::from(e)
            })?
            .ok_or_else(|| AppError::not_found(anyhow!("Post not found")))?;

        purge_slots(state, &row, &post).await;

        info!(post.id = %id, "Post deleted successfully");
        Ok(())
    }
}
