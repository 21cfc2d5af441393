//! API server configuration.

use keygate_core::auth::jwt::TokenConfig;
use keygate_core::mail::SmtpConfig;

/// Identity-provider redirect settings.
#[derive(Clone, Debug)]
pub struct IdpConfig {
    /// Provider consent-screen URL the initiate route redirects to.
    pub auth_url: String,
    pub client_id: String,
    /// Callback URL registered with the provider.
    pub redirect_uri: String,
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3200").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// Redis connection URL for the verification-code cache.
    pub redis_url: String,
    /// Access-token secret + lifetime.
    pub access_token: TokenConfig,
    /// Refresh-token secret + lifetime. Independent of the access pair.
    pub refresh_token: TokenConfig,
    /// Outbound mail credentials.
    pub smtp: SmtpConfig,
    /// External identity provider redirect pair.
    pub idp: IdpConfig,
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.into())
}

fn env_secs(name: &str, default: i64) -> i64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl ApiConfig {
    /// Reads configuration from environment variables with dev defaults.
    ///
    /// | Variable                        | Default                          |
    /// |---------------------------------|----------------------------------|
    /// | `BIND_ADDR`                     | `127.0.0.1:3200`                 |
    /// | `DATABASE_URL`                  | `postgres://localhost:5432/keygate` |
    /// | `REDIS_URL`                     | `redis://127.0.0.1:6379`         |
    /// | `JWT_ACCESS_TOKEN_SECRET`       | dev-only placeholder             |
    /// | `JWT_ACCESS_TOKEN_EXPIRES_IN`   | `900` (15 min)                   |
    /// | `JWT_REFRESH_TOKEN_SECRET`      | dev-only placeholder             |
    /// | `JWT_REFRESH_TOKEN_EXPIRES_IN`  | `2592000` (30 days)              |
    /// | `SMTP_HOST`                     | `smtp.mail.ru`                   |
    /// | `SMTP_USERNAME` / `SMTP_PASSWORD` | empty                          |
    /// | `GOOGLE_AUTH_URL`               | Google OAuth consent endpoint    |
    /// | `GOOGLE_CLIENT_ID` / `GOOGLE_REDIRECT_URI` | empty / local callback|
    pub fn from_env() -> Self {
        Self {
            bind_addr: env_or("BIND_ADDR", "127.0.0.1:3200"),
            database_url: env_or("DATABASE_URL", "postgres://localhost:5432/keygate"),
            redis_url: env_or("REDIS_URL", "redis://127.0.0.1:6379"),
            access_token: TokenConfig {
                secret: env_or("JWT_ACCESS_TOKEN_SECRET", "keygate-dev-access-secret"),
                expires_in: env_secs("JWT_ACCESS_TOKEN_EXPIRES_IN", 900),
            },
            refresh_token: TokenConfig {
                secret: env_or("JWT_REFRESH_TOKEN_SECRET", "keygate-dev-refresh-secret"),
                expires_in: env_secs("JWT_REFRESH_TOKEN_EXPIRES_IN", 30 * 24 * 3600),
            },
            smtp: SmtpConfig {
                host: env_or("SMTP_HOST", "smtp.mail.ru"),
                username: env_or("SMTP_USERNAME", ""),
                password: env_or("SMTP_PASSWORD", ""),
            },
            idp: IdpConfig {
                auth_url: env_or(
                    "GOOGLE_AUTH_URL",
                    "https://accounts.google.com/o/oauth2/v2/auth",
                ),
                client_id: env_or("GOOGLE_CLIENT_ID", ""),
                redirect_uri: env_or(
                    "GOOGLE_REDIRECT_URI",
                    "http://127.0.0.1:3200/auth/google/redirect",
                ),
            },
        }
    }
}
