use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
};
use madrasa_core::AppError;
use madrasa_core::serde::deserialize_optional_i64;
use madrasa_media::MediaError;
use madrasa_models::{DueAssetView, DueAssetsResponse, SweepResponse};
use serde::Deserialize;
use tracing::info;

use crate::state::AppState;

const DEFAULT_DUE_LIMIT: i64 = 100;
const MAX_DUE_LIMIT: i64 = 1000;

#[derive(Debug, Default, Deserialize)]
pub struct DueParams {
    #[serde(default, deserialize_with = "deserialize_optional_i64")]
    pub limit: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/api/media/due",
    params(
        ("limit" = Option<i64>, Query, description = "Maximum number of assets (1-1000, default 100)")
    ),
    responses(
        (status = 200, description = "Old assets whose retention window has elapsed, oldest deadline first", body = DueAssetsResponse),
        (status = 500, description = "Slot store unavailable")
    ),
    tag = "Media"
)]
pub async fn list_due_assets(
    State(state): State<AppState>,
    params: Result<Query<DueParams>, QueryRejection>,
) -> Result<Json<DueAssetsResponse>, AppError> {
    let Query(params) = params
        .map_err(|e| AppError::bad_request(anyhow::anyhow!("Invalid query parameters: {}", e)))?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_DUE_LIMIT)
        .clamp(1, MAX_DUE_LIMIT) as usize;

    let due = state
        .sweeper
        .due(state.clock.now(), limit)
        .await
        .map_err(MediaError::into_app_error)?;

    Ok(Json(DueAssetsResponse {
        data: due.iter().map(DueAssetView::from).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/media/sweep",
    responses(
        (status = 200, description = "One batch of expired old assets reclaimed", body = SweepResponse),
        (status = 500, description = "Slot store unavailable")
    ),
    tag = "Media"
)]
pub async fn run_sweep(State(state): State<AppState>) -> Result<Json<SweepResponse>, AppError> {
    let report = state
        .sweeper
        .sweep(state.clock.now())
        .await
        .map_err(MediaError::into_app_error)?;

    info!(
        reclaimed = report.reclaimed,
        failed = report.failed.len(),
        "Manual retention sweep"
    );

    Ok(Json(SweepResponse::from(&report)))
}
