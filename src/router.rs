use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Router, middleware};
use madrasa_observability::{logging_middleware, metrics_middleware};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable as _};
use utoipa_swagger_ui::SwaggerUi;

use crate::docs::ApiDoc;
use crate::modules::media::router::init_media_router;
use crate::modules::posts::init_posts_router;
use crate::modules::schools::init_schools_router;
use crate::modules::service_plans::init_service_plans_router;
use crate::modules::subjects::init_subjects_router;
use crate::state::AppState;

/// Headroom for non-file form fields on top of the per-file upload limit.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Schools carry the most slots (icon, logo and background).
const MAX_FILES_PER_REQUEST: usize = 3;

async fn render_metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

pub fn init_router(state: AppState) -> Router {
    let body_limit =
        state.media_config.max_upload_bytes * MAX_FILES_PER_REQUEST + FORM_OVERHEAD_BYTES;
    let public_objects = format!("/storage/v1/object/public/{}", state.storage_config.bucket);
    let objects_dir = state.storage_config.root.join(&state.storage_config.bucket);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(Scalar::with_url("/scalar", ApiDoc::openapi()))
        .route("/metrics", get(render_metrics))
        .nest_service(&public_objects, ServeDir::new(objects_dir))
        .nest(
            "/api",
            Router::new()
                .nest("/schools", init_schools_router())
                .nest("/schools/{school_id}/subjects", init_subjects_router())
                .nest("/schools/{school_id}/posts", init_posts_router())
                .nest(
                    "/schools/{school_id}/service-plans",
                    init_service_plans_router(),
                )
                .nest("/media", init_media_router())
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state.clone())
        .layer({
            let allowed_origins: Vec<HeaderValue> = state
                .cors_config
                .allowed_origins
                .iter()
                .filter_map(|origin| origin.parse().ok())
                .collect();

            CorsLayer::new()
                .allow_origin(allowed_origins)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::PATCH,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([
                    axum::http::header::CONTENT_TYPE,
                    axum::http::header::ACCEPT,
                ])
                .allow_credentials(true)
        })
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(logging_middleware))
}
