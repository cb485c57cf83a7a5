// SPDX-License-Identifier: MIT

//! Application error types with consistent API responses.
//!
//! The response contract is inherited from the original frontend: failed
//! provider operations answer with a JSON `{"error_status": true}` body
//! rather than a non-2xx status, and callers key off the flag. Only
//! missing authentication surfaces as a real HTTP status (401).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Credential refresh failed: {0}")]
    CredentialRefresh(String),

    #[error("Upstream provider error: {0}")]
    Upstream(String),

    #[error("Session store error: {0}")]
    Store(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "unauthorized"})),
            )
                .into_response(),
            AppError::CredentialRefresh(msg) => {
                tracing::warn!(error = %msg, "Credential refresh failed");
                (StatusCode::OK, Json(json!({"error_status": true}))).into_response()
            }
            AppError::Upstream(msg) => {
                tracing::error!(error = %msg, "Upstream provider error");
                (StatusCode::OK, Json(json!({"error_status": true}))).into_response()
            }
            AppError::Store(msg) => {
                tracing::error!(error = %msg, "Session store error");
                (StatusCode::OK, Json(json!({"error_status": true}))).into_response()
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": "internal_error"})),
                )
                    .into_response()
            }
        }
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
