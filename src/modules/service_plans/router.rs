use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::state::AppState;

use super::controller::{
    clear_service_plan_media, create_service_plan, delete_service_plan, get_service_plan,
    get_service_plans, update_service_plan,
};

/// Routes nested under `/schools/{school_id}/service-plans`.
pub fn init_service_plans_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_service_plan).get(get_service_plans))
        .route(
            "/{id}",
            get(get_service_plan)
                .patch(update_service_plan)
                .delete(delete_service_plan),
        )
        .route("/{id}/media/{slot}", delete(clear_service_plan_media))
}
