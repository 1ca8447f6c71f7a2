pub mod chat;
pub mod health;
pub mod models;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the service router.
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health::handler))
        .route("/v1/models", get(models::handler))
        .route("/v1/chat/completions", post(chat::handler))
        .with_state(state)
}
