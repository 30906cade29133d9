use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::AppState;

pub mod handlers;

/// Build the API router.
/// All routes are relative; the caller mounts this under `/api/v1`.
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/creators/:creator", get(handlers::creator_page))
        .route("/creators/:creator/state", get(handlers::creator_state))
        .route("/tasks/poll", post(handlers::poll_task))
}
