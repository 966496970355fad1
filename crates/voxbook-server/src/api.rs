//! API handlers for the voxbook server.

use crate::store::StoreError;
use crate::token::TokenError;
use crate::AppState;
use axum::{
    extract::{Extension, Json},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use thiserror::Error;
use voxbook_types::{CallSummary, TokenResponse};

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<TokenError> for ApiError {
    fn from(e: TokenError) -> Self {
        ApiError::InternalServerError(e.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::InternalServerError(e.to_string())
    }
}

/// Handler for `GET /api/token`.
///
/// Clears the previous call's summary before issuing a token, so a client
/// polling for the summary of this call never receives a stale one.
pub async fn token_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<TokenResponse>, ApiError> {
    if !state.tokens.is_enabled() {
        tracing::error!("token requested but LiveKit credentials are not configured");
        return Err(TokenError::NotConfigured.into());
    }

    if let Err(e) = state.summaries.clear().await {
        tracing::warn!(error = %e, "failed to clear previous summary");
    }

    let response = state.tokens.issue()?;
    Ok(Json(response))
}

/// Handler for `GET /api/summary`.
pub async fn summary_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<CallSummary>, ApiError> {
    match state.summaries.load().await {
        Ok(Some(summary)) => Ok(Json(summary)),
        Ok(None) => Err(ApiError::NotFound("No summary found".to_string())),
        Err(e) => {
            tracing::error!(error = %e, path = %state.summaries.path().display(), "failed to read summary");
            Err(e.into())
        }
    }
}
