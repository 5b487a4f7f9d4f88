use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

use super::controller::{list_due_assets, run_sweep};

pub fn init_media_router() -> Router<AppState> {
    Router::new()
        .route("/due", get(list_due_assets))
        .route("/sweep", post(run_sweep))
}
