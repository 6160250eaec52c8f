//! API routes for the profiler server

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, warn};

use crate::error::ProfilerError;
use crate::pipeline::{AnswerOutcome, Profiler, StartOutcome};

/// Application state
pub struct AppState {
    pub profiler: Arc<Profiler>,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Start request
#[derive(Deserialize)]
pub struct StartRequest {
    pub url: String,
}

/// Answer request
#[derive(Deserialize)]
pub struct AnswerRequest {
    pub session_id: String,
    pub answer: String,
}

/// Error body returned for every failed request
#[derive(Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

/// A [`ProfilerError`] rendered as an HTTP response
pub struct ApiError(ProfilerError);

impl From<ProfilerError> for ApiError {
    fn from(err: ProfilerError) -> Self {
        Self(err)
    }
}

pub fn status_for(err: &ProfilerError) -> StatusCode {
    match err {
        ProfilerError::Fetch { .. } => StatusCode::BAD_GATEWAY,
        ProfilerError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        ProfilerError::SessionConflict { .. } => StatusCode::CONFLICT,
        ProfilerError::InvalidInput(_) | ProfilerError::SessionNotTerminal(_) => {
            StatusCode::BAD_REQUEST
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            warn!("Request rejected: {}", self.0);
        }
        let body = ErrorResponse {
            error: self.0.to_string(),
            kind: self.0.kind().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Profile a page and return the first question
pub async fn start(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<StartRequest>,
) -> Result<Json<StartOutcome>, ApiError> {
    let outcome = app_state.profiler.start(&payload.url).await?;
    Ok(Json(outcome))
}

/// Record an answer and return the next question or the classification
pub async fn answer(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<AnswerRequest>,
) -> Result<Json<AnswerOutcome>, ApiError> {
    let outcome = app_state
        .profiler
        .answer(&payload.session_id, &payload.answer)
        .await?;
    Ok(Json(outcome))
}
