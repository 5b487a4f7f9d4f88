use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::state::AppState;

use super::controller::{
    clear_post_media, create_post, delete_post, get_post, get_posts, update_post,
};

/// Routes nested under `/schools/{school_id}/posts`.
pub fn init_posts_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_post).get(get_posts))
        .route("/{id}", get(get_post).patch(update_post).delete(delete_post))
        .route("/{id}/media/{slot}", delete(clear_post_media))
}
