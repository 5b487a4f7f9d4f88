use anyhow::anyhow;
use madrasa_core::{AppError, PaginationMeta};
use madrasa_models::{
    CreateServicePlanDto, MediaUpdateResponse, PaginatedServicePlansResponse, ServicePlan,
    ServicePlanFilterParams, UpdateServicePlanDto,
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

impl MediaDto for UpdateServicePlanDto {
    type Entity = ServicePlan;
}

const TABLE: &str = "service_plans";

pub struct ServicePlanService;

impl ServicePlanService {
    #[instrument(skip(db, dto), fields(school.id = %school_id, plan.name = %dto.name, db.operation = "INSERT", db.table = TABLE))]
    pub async fn create_service_plan(
        db: &PgPool,
        school_id: Uuid,
        dto: CreateServicePlanDto,
    ) -> Result<ServicePlan, AppError> {
        let plan = sqlx::query_as::<_, ServicePlan>(
            "INSERT INTO service_plans (school_id, name, description, price_cents, currency)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING *",
        )
        .bind(school_id)
        .bind(&dto.name)
        .bind(&dto.description)
        .bind(dto.price_cents)
        .bind(dto.currency.to_ascii_uppercase())
        .fetch_one(db)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e
                && db_err.is_foreign_key_violation()
            {
                return AppError::not_found(anyhow!("School not found"));
            }
            error!(error = %e, "Database error creating service plan");
            AppError::from(e)
        })?;

        info!(plan.id = %plan.id, "Service plan created successfully");
        Ok(plan)
    }

    #[instrument(skip(db, filters), fields(school.id = %school_id, db.operation = "SELECT", db.table = TABLE))]
    pub async fn get_service_plans(
        db: &PgPool,
        school_id: Uuid,
        filters: ServicePlanFilterParams,
    ) -> Result<PaginatedServicePlansResponse, AppError> {
        ensure_school_exists(db, school_id).await?;

        let limit = filters.pagination.limit();
        let offset = filters.pagination.offset();
        let name = filters.name.as_ref().map(|n| format!("%{}%", n));

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM service_plans
             WHERE school_id = $1 AND ($2::text IS NULL OR name ILIKE $2)",
        )
        .bind(school_id)
        .bind(&name)
        .fetch_one(db)
        .await?;

        let plans = sqlx::query_as::<_, ServicePlan>(
            "SELECT * FROM service_plans
             WHERE school_id = $1 AND ($2::text IS NULL OR name ILIKE $2)
             ORDER BY price_cents ASC, name ASC
             LIMIT $3 OFFSET $4",
        )
        .bind(school_id)
        .bind(&name)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await
        .map_err(|e| {
            error!(error = %e, "Database error fetching service plans");
            AppError::from(e)
        })?;

        debug!(total = %total, returned = %plans.len(), "Service plans fetched");

        Ok(PaginatedServicePlansResponse {
            data: plans,
            meta: PaginationMeta::for_page(&filters.pagination, total),
        })
    }

    pub async fn get_service_plan(
        db: &PgPool,
        school_id: Uuid,
        id: Uuid,
    ) -> Result<ServicePlan, AppError> {
        RowRef::scoped(TABLE, school_id, id)
            .select()
            .build_query_as::<ServicePlan>()
            .fetch_optional(db)
            .await?
            .ok_or_else(|| AppError::not_found(anyhow!("Service plan not found")))
    }

    #[instrument(skip(state, form), fields(school.id = %school_id, plan.id = %id))]
    pub async fn update_service_plan(
        state: &AppState,
        school_id: Uuid,
        id: Uuid,
        form: MediaForm<UpdateServicePlanDto>,
    ) -> Result<MediaUpdateResponse<ServicePlan>, AppError> {
        let MediaForm { dto, changes } = form;

        let mut fields = Vec::new();
        if let Some(name) = dto.name {
            fields.push(("name", FieldValue::Text(Some(name))));
        }
        if let Some(description) = dto.description {
            fields.push(("description", FieldValue::Text(Some(description))));
        }
        if let Some(price_cents) = dto.price_cents {
            fields.push(("price_cents", FieldValue::Int(price_cents)));
        }
        if let Some(currency) = dto.currency {
            fields.push(("currency", FieldValue::Text(Some(currency.to_ascii_uppercase()))));
        }

        let row = RowRef::scoped(TABLE, school_id, id);
        let (plan, media) = update_with_media::<ServicePlan>(state, row, fields, changes).await?;

        info!(plan.id = %plan.id, "Service plan updated successfully");
        Ok(MediaUpdateResponse::new(plan, media))
    }

    #[instrument(skip(state), fields(school.id = %school_id, plan.id = %id))]
    pub async fn clear_service_plan_media(
        state: &AppState,
        school_id: Uuid,
        id: Uuid,
        slot: &str,
    ) -> Result<MediaUpdateResponse<ServicePlan>, AppError> {
        let slot = slot_named::<ServicePlan>(slot)?;
        let receipt = clear_slot(state, RowRef::scoped(TABLE, school_id, id), slot).await?;
        let plan = Self::get_service_plan(&state.db, school_id, id).await?;
        Ok(MediaUpdateResponse::new(plan, vec![receipt]))
    }

    #[instrument(skip(state), fields(school.id = %school_id, plan.id = %id, db.operation = "DELETE", db.table = TABLE))]
    pub async fn delete_service_plan(
        state: &AppState,
        school_id: Uuid,
        id: Uuid,
    ) -> Result<(), AppError> {
        let row = RowRef::scoped(TABLE, school_id, id);
        let plan = row
            .delete()
            .build_query_as::<ServicePlan>()
            .fetch_optional(&state.db)
            .await?
            .ok_or_else(|| AppError::not_found(anyhow!("Service plan not found")))?;

        purge_slots(state, &row, &plan).await;

        info!(plan.id = %id, "Service plan deleted successfully");
        Ok(())
    }
}
