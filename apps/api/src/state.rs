use std::sync::Arc;

use crate::chatbot::Chatbot;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Lazily initialized on the first chat or readiness request.
    pub chatbot: Arc<Chatbot>,
}
