use anyhow::anyhow;
use madrasa_core::{AppError, PaginationMeta};
use madrasa_models::{
    CreateSchoolDto, MediaUpdateResponse, PaginatedSchoolsResponse, Post, School,
    SchoolFilterParams, ServicePlan, Subject, UpdateSchoolDto,
};
use sqlx::PgPool;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::modules::media::{
    FieldValue, MediaDto, MediaForm, RowRef, clear_slot, purge_slots, slot_named,
    update_with_media,
};
use crate::state::AppState;

impl MediaDto for UpdateSchoolDto {
    type Entity = School;
}

pub struct SchoolService;

impl SchoolService {
    #[instrument(skip(db, dto), fields(school.name = %dto.name, db.operation = "INSERT", db.table = "schools"))]
    pub async fn create_school(db: &PgPool, dto: CreateSchoolDto) -> Result<School, AppError> {
        debug!(school.name = %dto.name, school.address = ?dto.address, "Creating new school");

        let school = sqlx::query_as::<_, School>(
            "INSERT INTO schools (name, address, phone) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(&dto.name)
        .bind(&dto.address)
        .bind(&dto.phone)
        .fetch_one(db)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e
                && db_err.is_unique_violation()
            {
                warn!(school.name = %dto.name, "Attempted to create school with existing name");
                return AppError::bad_request(anyhow!("School name already exists"));
            }
            error!(error = %e, school.name = %dto.name, "Database error creating school");
            AppError::from(e)
        })?;

        info!(
            school.id = %school.id,
            school.name = %school.name,
            "School created successfully"
        );

        Ok(school)
    }

    #[instrument(skip(db, filters), fields(db.operation = "SELECT", db.table = "schools"))]
    pub async fn get_all_schools(
        db: &PgPool,
        filters: SchoolFilterParams,
    ) -> Result<PaginatedSchoolsResponse, AppError> {
        let limit = filters.pagination.limit();
        let offset = filters.pagination.offset();

        debug!(
            limit = %limit,
            offset = %offset,
            filter.name = ?filters.name,
            "Fetching schools with pagination"
        );

        let mut where_clause = String::from(" WHERE 1=1");
        let mut params = Vec::new();

        if let Some(name) = &filters.name {
            params.push(format!("%{}%", name));
            where_clause.push_str(&format!(" AND name ILIKE ${}", params.len()));
        }

        let count_query = format!("SELECT COUNT(*) FROM schools{}", where_clause);
        let mut count_sql = sqlx::query_scalar::<_, i64>(&count_query);
        for param in &params {
            count_sql = count_sql.bind(param);
        }
        let total = count_sql.fetch_one(db).await.map_err(|e| {
            error!(error = %e, "Database error counting schools");
            AppError::from(e)
        })?;

        let data_query = format!(
            "SELECT * FROM schools{} ORDER BY created_at DESC LIMIT {} OFFSET {}",
            where_clause, limit, offset
        );
        let mut data_sql = sqlx::query_as::<_, School>(&data_query);
        for param in params {
            data_sql = data_sql.bind(param);
        }
        let schools = data_sql.fetch_all(db).await.map_err(|e| {
            error!(error = %e, "Database error fetching schools");
            AppError::from(e)
        })?;

        debug!(total = %total, returned = %schools.len(), "Schools fetched successfully");

        Ok(PaginatedSchoolsResponse {
            data: schools,
            meta: PaginationMeta::for_page(&filters.pagination, total),
        })
    }

    #[instrument(skip(db), fields(school.id = %id, db.operation = "SELECT", db.table = "schools"))]
    pub async fn get_school_by_id(db: &PgPool, id: Uuid) -> Result<School, AppError> {
        sqlx::query_as::<_, School>("SELECT * FROM schools WHERE id = $1")
            .bind(id)
            .fetch_optional(db)
            .await
            .map_err(|e| {
                error!(error = %e, school.id = %id, "Database error fetching school");
                AppError::from(e)
            })?
            .ok_or_else(|| {
                debug!(school.id = %id, "School not found");
                AppError::not_found(anyhow!("School not found"))
            })
    }

    /// Applies a partial update, including any icon, logo or background change.
    #[instrument(skip(state, form), fields(school.id = %id))]
    pub async fn update_school(
        state: &AppState,
        id: Uuid,
        form: MediaForm<UpdateSchoolDto>,
    ) -> Result<MediaUpdateResponse<School>, AppError> {
        let MediaForm { dto, changes } = form;

        let mut fields = Vec::new();
        if let Some(name) = dto.name {
            fields.push(("name", FieldValue::Text(Some(name))));
        }
        if let Some(address) = dto.address {
            fields.push(("address", FieldValue::Text(Some(address))));
        }
        if let Some(phone) = dto.phone {
            fields.push(("phone", FieldValue::Text(Some(phone))));
        }

        let (school, media) =
            update_with_media::<School>(state, RowRef::school(id), fields, changes).await?;

        info!(
            school.id = %school.id,
            media.changed = media.iter().filter(|r| r.changed()).count(),
            "School updated successfully"
        );

        Ok(MediaUpdateResponse::new(school, media))
    }

    #[instrument(skip(state), fields(school.id = %id))]
    pub async fn clear_school_media(
        state: &AppState,
        id: Uuid,
        slot: &str,
    ) -> Result<MediaUpdateResponse<School>, AppError> {
        let slot = slot_named::<School>(slot)?;
        let receipt = clear_slot(state, RowRef::school(id), slot).await?;
        let school = Self::get_school_by_id(&state.db, id).await?;
        Ok(MediaUpdateResponse::new(school, vec![receipt]))
    }

    /// Deletes a school with everything it owns, then removes the stored
    /// assets of every deleted row.
    #[instrument(skip(state), fields(school.id = %id, db.operation = "DELETE", db.table = "schools"))]
    pub async fn delete_school(state: &AppState, id: Uuid) -> Result<(), AppError> {
        let mut tx = state.db.begin().await?;

        let subjects =
            sqlx::query_as::<_, Subject>("DELETE FROM subjects WHERE school_id = $1 RETURNING *")
                .bind(id)
                .fetch_all(&mut *tx)
                .await?;
        let posts = sqlx::query_as::<_, Post>("DELETE FROM posts WHERE school_id = $1 RETURNING *")
            .bind(id)
            .fetch_all(&mut *tx)
            .await?;
        let plans = sqlx::query_as::<_, ServicePlan>(
            "DELETE FROM service_plans WHERE school_id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let row = RowRef::school(id);
        let school = row
            .delete()
            .build_query_as::<School>()
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| {
                error!(error = %e, school.id = %id, "Database error deleting school");
                AppError::from(e)
            })?
            .ok_or_else(|| AppError::not_found(anyhow!("School not found")))?;

        tx.commit().await?;

        purge_slots(state, &row, &school).await;
        for subject in &subjects {
            let row = RowRef::scoped("subjects", id, subject.id.into_inner());
            purge_slots(state, &row, subject).await;
        }
        for post in &posts {
            let row = RowRef::scoped("posts", id, post.id.into_inner());
            purge_slots(state, &row, post).await;
        }
        for plan in &plans {
            let row = RowRef::scoped("service_plans", id, plan.id.into_inner());
            purge_slots(state, &row, plan).await;
        }

        info!(
            school.id = %id,
            subjects = subjects.len(),
            posts = posts.len(),
            service_plans = plans.len(),
            "School deleted successfully"
        );

        Ok(())
    }
}

/// Fails with 404 unless the school exists, for routes nested under `/schools/{school_id}`.
pub(crate) async fn ensure_school_exists(db: &PgPool, school_id: Uuid) -> Result<(), AppError> {
    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM schools WHERE id = $1)")
        .bind(school_id)
        .fetch_one(db)
        .await?;

    if exists {
        Ok(())
    } else {
        Err(AppError::not_found(anyhow!("School not found")))
    }
}
