use super::events::UiEvent;
use super::state::AppState;
use crate::error::SessionError;
use crate::session::{SessionState, SessionStats, TranscriptEntry};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use tracing::{error, info};

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    pub state: SessionState,
}

#[derive(Debug, Serialize)]
pub struct SessionStatusResponse {
    pub state: SessionState,
    pub stats: SessionStats,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_status(err: &SessionError) -> StatusCode {
    match err {
        SessionError::AlreadyActive => StatusCode::CONFLICT,
        SessionError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        SessionError::Channel(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /session/start
/// Start a new voice session
pub async fn start_session(State(state): State<AppState>) -> impl IntoResponse {
    info!("Starting voice session");

    match state.engine.start().await {
        Ok(()) => (
            StatusCode::OK,
            Json(StartSessionResponse {
                state: state.engine.state(),
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to start session: {}", e);
            (
                error_status(&e),
                Json(ErrorResponse {
                    error: format!("Failed to start session: {}", e),
                }),
            )
                .into_response()
        }
    }
}

/// POST /session/stop
/// Stop the session (if any) and return its statistics
pub async fn stop_session(State(state): State<AppState>) -> Json<SessionStats> {
    info!("Stopping voice session");
    Json(state.engine.stop().await)
}

/// GET /session/status
pub async fn session_status(State(state): State<AppState>) -> Json<SessionStatusResponse> {
    Json(SessionStatusResponse {
        state: state.engine.state(),
        stats: state.engine.stats().await,
    })
}

/// GET /session/transcript
/// Completed turns of the current (or last) session
pub async fn session_transcript(State(state): State<AppState>) -> Json<Vec<TranscriptEntry>> {
    Json(state.engine.transcript().await)
}

/// GET /session/events
pub async fn session_events(State(state): State<AppState>) -> Json<Vec<UiEvent>> {
    Json(state.events.snapshot())
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
