pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::chatbot::handlers;
use crate::errors::AppError;
use crate::state::AppState;

async fn not_found() -> AppError {
    AppError::NotFound("No such route".to_string())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Chat API
        .route("/api/v1/chat", post(handlers::handle_chat))
        .route("/api/v1/chat/ready", get(handlers::handle_ready))
        .fallback(not_found)
        .with_state(state)
}
