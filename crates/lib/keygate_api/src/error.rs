//! Application error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("You are already authorized on this device")]
    AlreadyAuthenticated,

    #[error("Refresh session not found")]
    SessionNotFound,

    #[error("Refresh token is not valid")]
    InvalidRefreshToken,

    #[error("Not valid code")]
    InvalidVerificationCode,

    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, "validation_error", m.as_str()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m.as_str()),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, "unauthorized", m.as_str()),
            AppError::AlreadyAuthenticated => (
                StatusCode::BAD_REQUEST,
                "already_authenticated",
                "You are already authorized on this device",
            ),
            AppError::SessionNotFound => (
                StatusCode::BAD_REQUEST,
                "session_not_found",
                "Refresh session not found",
            ),
            AppError::InvalidRefreshToken => (
                StatusCode::BAD_REQUEST,
                "invalid_refresh_token",
                "Refresh token is not valid",
            ),
            AppError::InvalidVerificationCode => (
                StatusCode::BAD_REQUEST,
                "invalid_verification_code",
                "Not valid code",
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error",
            ),
        };
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<keygate_core::auth::AuthError> for AppError {
    fn from(e: keygate_core::auth::AuthError) -> Self {
        use keygate_core::auth::AuthError;
        match e {
            AuthError::UserNotFound => {
                AppError::NotFound("There is no user with such a login".into())
            }
            AuthError::InvalidCredentials => AppError::Unauthorized("Invalid credentials".into()),
            AuthError::AlreadyAuthenticated => AppError::AlreadyAuthenticated,
            AuthError::SessionNotFound => AppError::SessionNotFound,
            AuthError::InvalidRefreshToken => AppError::InvalidRefreshToken,
            AuthError::InvalidVerificationCode => AppError::InvalidVerificationCode,
            AuthError::Directory(msg) => AppError::Validation(msg),
            AuthError::Token(msg) => AppError::Internal(msg),
            AuthError::Store(e) => AppError::Internal(e.to_string()),
            AuthError::Cache(msg) => AppError::Internal(msg),
            AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}
