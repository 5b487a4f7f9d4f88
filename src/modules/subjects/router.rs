use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::state::AppState;

use super::controller::{
    clear_subject_media, create_subject, delete_subject, get_subject, get_subjects,
    update_subject,
};

/// Routes nested under `/schools/{school_id}/subjects`.
pub fn init_subjects_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_subject).get(get_subjects))
        .route(
            "/{id}",
            get(get_subject).patch(update_subject).delete(delete_subject),
        )
        .route("/{id}/media/{slot}", delete(clear_subject_media))
}
