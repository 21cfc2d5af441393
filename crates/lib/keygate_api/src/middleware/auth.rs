//! Authentication middleware — Bearer token extraction and verification.
//!
//! An access token alone is not enough: the calling device must also hold a
//! live refresh session, so a logged-out device's still-unexpired access
//! tokens stop working immediately.

use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use keygate_core::auth::sessions::SessionFilter;

use crate::AppState;
use crate::error::AppError;
use crate::extract::fingerprint_from_headers;

/// Verified caller identity stored in request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
}

/// Axum middleware: extracts `Authorization: Bearer <token>`, verifies the
/// access token, confirms a live session for the calling device, and injects
/// `AuthenticatedUser` into request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".into()))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization scheme".into()))?;

    let claims = state
        .access_signer
        .verify(token)
        .map_err(|_| AppError::Unauthorized("Invalid or expired token".into()))?;

    let user_id = claims
        .sub
        .parse::<Uuid>()
        .map_err(|_| AppError::Unauthorized("Invalid token subject".into()))?;

    let fingerprint = fingerprint_from_headers(request.headers());
    let sessions = state
        .sessions
        .find(&SessionFilter::device(user_id, &fingerprint))
        .await
        .map_err(AppError::from)?;
    if sessions.is_empty() {
        return Err(AppError::Unauthorized("No session for this device".into()));
    }

    request
        .extensions_mut()
        .insert(AuthenticatedUser { user_id });

    Ok(next.run(request).await)
}
