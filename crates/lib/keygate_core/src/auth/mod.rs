//! Authentication logic.
//!
//! Provides password hashing, token issuance and verification, the
//! refresh-session store, and the verification-code flow shared by
//! `keygate_api`.

pub mod jwt;
pub mod oauth;
pub mod password;
pub mod sessions;
pub mod verification;

use thiserror::Error;

/// Authentication errors.
///
/// The first six variants are client-facing with stable machine-readable
/// kinds; the rest are collaborator failures surfaced as generic service
/// errors at the boundary.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("There is no user with such a login")]
    UserNotFound,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("You are already authorized on this device")]
    AlreadyAuthenticated,

    #[error("Refresh session not found")]
    SessionNotFound,

    #[error("Refresh token is not valid")]
    InvalidRefreshToken,

    #[error("Not valid code")]
    InvalidVerificationCode,

    #[error("Directory error: {0}")]
    Directory(String),

    #[error("Token error: {0}")]
    Token(String),

    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<crate::cache::CacheError> for AuthError {
    fn from(e: crate::cache::CacheError) -> Self {
        AuthError::Cache(e.to_string())
    }
}
