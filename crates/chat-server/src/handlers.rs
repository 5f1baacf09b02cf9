//! HTTP Handlers

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use chat_core::ThreadId;

use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub completion_connected: bool,
    pub search_enabled: bool,
}

/// Body of `POST /chat`.
///
/// Both fields are required but declared optional here: validation happens
/// by hand so a missing field yields the documented 400 body rather than an
/// extractor rejection.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, rename = "threadId")]
    pub thread_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let completion_connected = state.provider.health_check().await.unwrap_or(false);

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        completion_connected,
        search_enabled: state.search_enabled,
    })
}

/// Main chat endpoint
pub async fn chat_handler(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ErrorResponse>)> {
    let message = payload.message.filter(|s| !s.is_empty());
    let thread_id = payload.thread_id.filter(|s| !s.is_empty());

    let (Some(message), Some(thread_id)) = (message, thread_id) else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Missing required fields: message and threadId".into(),
            }),
        ));
    };

    tracing::info!(thread = %thread_id, "chat request");

    let thread = ThreadId::from_string(thread_id);
    let answer = state
        .orchestrator
        .respond(&thread, &message)
        .await
        .map_err(|e| {
            tracing::error!(thread = %thread, error = %e, "orchestration failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.user_message(),
                }),
            )
        })?;

    Ok(Json(ChatResponse { message: answer }))
}
