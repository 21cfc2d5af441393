//! Authentication request handlers.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::{Extension, Json};

use crate::AppState;
use crate::error::AppResult;
use crate::extract::fingerprint_from_headers;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{
    AccessTokenResponse, LoginRequest, LoginResponse, RefreshTokenRequest, RegisterRequest,
    RegisterResponse, ResetPasswordRequest, SendVerificationCodeRequest, StatusResponse,
    WhoAmIResponse,
};

/// `POST /auth/login` — authenticate and bind a session to this device.
pub async fn login_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let fingerprint = fingerprint_from_headers(&headers);
    let pair = state
        .auth
        .login(&body.login, &body.password, &fingerprint)
        .await?;
    Ok(Json(pair.into()))
}

/// `POST /auth/registration` — create a new user account.
pub async fn registration_handler(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> AppResult<Json<RegisterResponse>> {
    let user = state
        .auth
        .register(&body.login, &body.password, &body.first_name, &body.last_name)
        .await?;
    Ok(Json(RegisterResponse {
        status: "success".into(),
        data: user.into(),
    }))
}

/// `POST /auth/refresh-token` — exchange a refresh token for a new access
/// token. The stored refresh token is not rotated.
pub async fn refresh_token_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<RefreshTokenRequest>,
) -> AppResult<Json<AccessTokenResponse>> {
    let fingerprint = fingerprint_from_headers(&headers);
    let access = state
        .auth
        .refresh_token(&body.refresh_token, &fingerprint)
        .await?;
    Ok(Json(AccessTokenResponse {
        access_token: access.into(),
    }))
}

/// `POST /auth/me` — identity echo for the verified caller.
pub async fn me_handler(
    Extension(user): Extension<AuthenticatedUser>,
) -> AppResult<Json<WhoAmIResponse>> {
    Ok(Json(WhoAmIResponse {
        user_id: user.user_id.to_string(),
    }))
}

/// `POST /auth/logout` — drop this device's session.
pub async fn logout_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    headers: HeaderMap,
) -> AppResult<Json<StatusResponse>> {
    let fingerprint = fingerprint_from_headers(&headers);
    state.auth.logout(user.user_id, &fingerprint).await?;
    Ok(Json(StatusResponse::success("logged out of this device")))
}

/// `POST /auth/logout-all` — drop every session of the caller.
pub async fn logout_all_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> AppResult<Json<StatusResponse>> {
    state.auth.logout_all(user.user_id).await?;
    Ok(Json(StatusResponse::success("logged out from all devices")))
}

/// `POST /auth/send-verification-code` — issue and mail a reset code.
pub async fn send_verification_code_handler(
    State(state): State<AppState>,
    Json(body): Json<SendVerificationCodeRequest>,
) -> AppResult<Json<StatusResponse>> {
    state.auth.send_verification_code(&body.email).await?;
    Ok(Json(StatusResponse::success("code sent")))
}

/// `POST /auth/reset-password` — reset the password gated by the code.
pub async fn reset_password_handler(
    State(state): State<AppState>,
    Json(body): Json<ResetPasswordRequest>,
) -> AppResult<Json<StatusResponse>> {
    state
        .auth
        .reset_password(&body.email, &body.code, &body.new_password)
        .await?;
    Ok(Json(StatusResponse::success("password update")))
}
