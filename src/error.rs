// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Google OAuth error: {0}")]
    OAuth(String),

    #[error("Drive API error: {0}")]
    Drive(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Marker message for Drive 429 responses; the rate limiter retries these.
    pub const DRIVE_RATE_LIMIT: &'static str = "Drive rate limit exceeded";

    /// Marker message for Drive 401 responses (expired or revoked token).
    pub const DRIVE_TOKEN_ERROR: &'static str = "Drive access token rejected";

    /// Whether this error is a provider throttling response (HTTP 429).
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AppError::Drive(msg) if msg == Self::DRIVE_RATE_LIMIT)
    }

    /// Whether this error is a provider not-found response (HTTP 404).
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::OAuth(msg) => {
                tracing::error!(error = %msg, "OAuth error");
                (StatusCode::INTERNAL_SERVER_ERROR, "oauth_error", None)
            }
            AppError::Drive(msg) => {
                tracing::error!(error = %msg, "Drive API error");
                (StatusCode::INTERNAL_SERVER_ERROR, "drive_error", None)
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
