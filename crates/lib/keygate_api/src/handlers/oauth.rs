//! External identity provider redirect pair.
//!
//! The provider protocol (token exchange, profile fetch) is delegated; these
//! routes only hand out the consent-screen redirect and validate the state
//! parameter on the way back.

use axum::Json;
use axum::extract::{Query, State};
use axum::response::Redirect;
use serde::Deserialize;
use url::Url;

use crate::AppState;
use crate::error::{AppError, AppResult};

/// Query parameters on the provider callback.
#[derive(Debug, Deserialize)]
pub struct OAuthCallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
}

/// `GET /auth/google` — redirect to the provider's consent screen.
pub async fn google_auth_handler(State(state): State<AppState>) -> AppResult<Redirect> {
    state.oauth_states.cleanup();
    let csrf_state = state.oauth_states.issue();

    let idp = &state.config.idp;
    let url = Url::parse_with_params(
        &idp.auth_url,
        &[
            ("client_id", idp.client_id.as_str()),
            ("redirect_uri", idp.redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", "openid email profile"),
            ("state", csrf_state.as_str()),
        ],
    )
    .map_err(|e| AppError::Internal(format!("provider auth url: {e}")))?;

    Ok(Redirect::to(url.as_str()))
}

/// `GET /auth/google/redirect` — provider callback.
pub async fn google_redirect_handler(
    State(state): State<AppState>,
    Query(params): Query<OAuthCallbackParams>,
) -> AppResult<Json<serde_json::Value>> {
    let valid_state = params
        .state
        .as_deref()
        .is_some_and(|s| state.oauth_states.take(s));
    if !valid_state {
        return Err(AppError::Unauthorized("Invalid oauth state".into()));
    }
    let Some(code) = params.code else {
        return Err(AppError::Validation("No user from google".into()));
    };

    Ok(Json(serde_json::json!({
        "message": "User information from google",
        "authorizationCode": code,
    })))
}
