//! Axum route handlers for the Chat API.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::chatbot::policy::{Answer, Provenance, EMPTY_QUESTION_MESSAGE};
use crate::chatbot::question::Question;
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub provenance: Provenance,
}

#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub grounded: bool,
}

/// POST /api/v1/chat
///
/// A missing or empty `message` is a 400. A whitespace-only one is a question,
/// answered with the fixed empty-question message.
pub async fn handle_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let message = request
        .message
        .filter(|m| !m.is_empty())
        .ok_or_else(|| AppError::Validation("No message provided".to_string()))?;

    let span = info_span!("chat", request_id = %Uuid::new_v4());
    async move {
        let Some(policy) = state.chatbot.ready_policy().await else {
            return Err(AppError::ServiceUnavailable(
                "Chatbot service is currently unavailable. Please try again later.".to_string(),
            ));
        };

        info!(message = %message, "Chat API received user message");
        let answer = match Question::parse(&message) {
            Ok(question) => policy.resolve(&question).await,
            Err(_) => Answer::fixed(EMPTY_QUESTION_MESSAGE),
        };
        info!(provenance = ?answer.provenance, "Chat API sending response");

        Ok(Json(ChatResponse {
            response: answer.text,
            provenance: answer.provenance,
        }))
    }
    .instrument(span)
    .await
}

/// GET /api/v1/chat/ready
pub async fn handle_ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    let readiness = state.chatbot.ensure_ready().await;
    Json(ReadyResponse {
        ready: readiness.ready,
        grounded: readiness.grounded,
    })
}
