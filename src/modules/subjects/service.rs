use anyhow::anyhow;
use madrasa_core::{AppError, PaginationMeta};
use madrasa_models::{
    CreateSubjectDto, MediaUpdateResponse, PaginatedSubjectsResponse, Subject,
    SubjectFilterParams, UpdateSubjectDto,
};
use sqlx::PgPool;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::modules::media::{
    FieldValue, MediaDto, MediaForm, RowRef, clear_slot, purge_slots, slot_named,
    update_with_media,
};
use crate::modules::schools::ensure_school_exists;
use crate::state::AppState;

impl MediaDto for UpdateSubjectDto {
    type Entity = Subject;
}

const TABLE: &str = "subjects";

pub struct SubjectService;

impl SubjectService {
    #[instrument(skip(db, dto), fields(school.id = %school_id, subject.name = %dto.name, db.operation = "INSERT", db.table = TABLE))]
    pub async fn create_subject(
        db: &PgPool,
        school_id: Uuid,
        dto: CreateSubjectDto,
    ) -> Result<Subject, AppError> {
        let subject = sqlx::query_as::<_, Subject>(
            "INSERT INTO subjects (school_id, name, code, description)
             VALUES ($1, $2, $3, $4)
             RETURNING *",
        )
        .bind(school_id)
        .bind(&dto.name)
        .bind(&dto.code)
        .bind(&dto.description)
        .fetch_one(db)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_foreign_key_violation() {
                    return AppError::not_found(anyhow!("School not found"));
                }
                if db_err.is_unique_violation() {
                    warn!(subject.code = ?dto.code, "Duplicate subject code");
                    return AppError::bad_request(anyhow!(
                        "Subject code already exists in this school"
                    ));
                }
            }
            error!(error = %e, "Database error creating subject");
            AppError::from(e)
        })?;

        info!(subject.id = %subject.id, "Subject created successfully");
        Ok(subject)
    }

    #[instrument(skip(db, filters), fields(school.id = %school_id, db.operation = "SELECT", db.table = TABLE))]
    pub async fn get_subjects(
        db: &PgPool,
        school_id: Uuid,
        filters: SubjectFilterParams,
    ) -> Result<PaginatedSubjectsResponse, AppError> {
        ensure_school_exists(db, school_id).await?;

        let limit = filters.pagination.limit();
        let offset = filters.pagination.offset();
        let name = filters.name.as_ref().map(|n| format!("%{}%", n));

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM subjects
             WHERE school_id = $1 AND ($2::text IS NULL OR name ILIKE $2)",
        )
        .bind(school_id)
        .bind(&name)
        .fetch_one(db)
        .await
        .map_err(|e| {
            error!(error = %e, "Database error counting subjects");
            AppError::from(e)
        })?;

        let subjects = sqlx::query_as::<_, Subject>(
            "SELECT * FROM subjects
             WHERE school_id = $1 AND ($2::text IS NULL OR name ILIKE $2)
             ORDER BY name ASC
             LIMIT $3 OFFSET $4",
        )
        .bind(school_id)
        .bind(&name)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await
        .map_err(|e| {
            error!(error = %e, "Database error fetching subjects");
            AppError::from(e)
        })?;

        debug!(total = %total, returned = %subjects.len(), "Subjects fetched");

        Ok(PaginatedSubjectsResponse {
            data: subjects,
            meta: PaginationMeta::for_page(&filters.pagination, total),
        })
    }

    #[instrument(skip(db), fields(db.operation = "SELECT", db.table = TABLE))]
    pub async fn get_subject(db: &PgPool, school_id: Uuid, id: Uuid) -> Result<Subject, AppError> {
        RowRef::scoped(TABLE, school_id, id)
            .select()
            .build_query_as::<Subject>()
            .fetch_optional(db)
            .await?
            .ok_or_else(|| AppError::not_found(anyhow!("Subject not found")))
    }

    #[instrument(skip(state, form), fields(school.id = %school_id, subject.id = %id))]
    pub async fn update_subject(
        state: &AppState,
        school_id: Uuid,
        id: Uuid,
        form: MediaForm<UpdateSubjectDto>,
    ) -> Result<MediaUpdateResponse<Subject>, AppError> {
        let MediaForm { dto, changes } = form;

        let mut fields = Vec::new();
        if let Some(name) = dto.name {
            fields.push(("name", FieldValue::Text(Some(name))));
        }
        if let Some(code) = dto.code {
            fields.push(("code", FieldValue::Text(Some(code))));
        }
        if let Some(description) = dto.description {
            fields.push(("description", FieldValue::Text(Some(description))));
        }

        let row = RowRef::scoped(TABLE, school_id, id);
        let (subject, media) = update_with_media::<Subject>(state, row, fields, changes).await?;

        info!(subject.id = %subject.id, "Subject updated successfully");
        Ok(MediaUpdateResponse::new(subject, media))
    }

    #[instrument(skip(state), fields(school.id = %school_id, subject.id = %id))]
    pub async fn clear_subject_media(
        state: &AppState,
        school_id: Uuid,
        id: Uuid,
        slot: &str,
    ) -> Result<MediaUpdateResponse<Subject>, AppError> {
        let slot = slot_named::<Subject>(slot)?;
        let receipt = clear_slot(state, RowRef::scoped(TABLE, school_id, id), slot).await?;
        let subject = Self::get_subject(&state.db, school_id, id).await?;
        Ok(MediaUpdateResponse::new(subject, vec![receipt]))
    }

    #[instrument(skip(state), fields(school.id = %school_id, subject.id = %id, db.operation = "DELETE", db.table = TABLE))]
    pub async fn delete_subject(state: &AppState, school_id: Uuid, id: Uuid) -> Result<(), AppError> {
        let row = RowRef::scoped(TABLE, school_id, id);
        let subject = row
            .delete()
            .build_query_as::<Subject>()
            .fetch_optional(&state.db)
            .await
            .map_err(|e| {
                error!(error = %e, "Database error deleting subject");
                AppError::from(e)
            })?
            .ok_or_else(|| AppError::not_found(anyhow!("Subject not found")))?;

        purge_slots(state, &row, &subject).await;

        info!(subject.id = %id, "Subject deleted successfully");
        Ok(())
    }
}
