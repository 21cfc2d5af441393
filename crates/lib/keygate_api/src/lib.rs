//! # keygate_api
//!
//! HTTP API library for Keygate.

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};

use keygate_core::auth::jwt::TokenSigner;
use keygate_core::auth::oauth::OAuthStateStore;
use keygate_core::auth::sessions::SessionStore;

use crate::config::ApiConfig;
use crate::handlers::{auth, oauth};
use crate::services::auth::AuthService;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Auth orchestration service.
    pub auth: AuthService,
    /// Session store, consulted by the bearer middleware.
    pub sessions: Arc<dyn SessionStore>,
    /// Access-token verifier for the bearer middleware.
    pub access_signer: TokenSigner,
    /// Pending identity-provider state parameters.
    pub oauth_states: Arc<OAuthStateStore>,
    /// API configuration.
    pub config: ApiConfig,
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public = Router::new()
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/registration", post(auth::registration_handler))
        .route("/auth/refresh-token", post(auth::refresh_token_handler))
        .route(
            "/auth/send-verification-code",
            post(auth::send_verification_code_handler),
        )
        .route("/auth/reset-password", post(auth::reset_password_handler))
        .route("/auth/google", get(oauth::google_auth_handler))
        .route("/auth/google/redirect", get(oauth::google_redirect_handler));

    // Protected routes (require a valid access token and a live session)
    let protected = Router::new()
        .route("/auth/me", post(auth::me_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/auth/logout-all", post(auth::logout_all_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(cors)
        .with_state(state)
}
