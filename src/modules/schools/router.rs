use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::state::AppState;

use super::controller::{
    clear_school_media, create_school, delete_school, get_all_schools, get_school, update_school,
};

pub fn init_schools_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_school).get(get_all_schools))
        .route(
            "/{school_id}",
            get(get_school).patch(update_school).delete(delete_school),
        )
        .route("/{school_id}/media/{slot}", delete(clear_school_media))
}
