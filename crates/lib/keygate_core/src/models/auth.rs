//! Authentication domain models.
//!
//! These are internal domain models, distinct from the API crate's wire DTOs
//! (which carry `#[serde(rename_all = "camelCase")]` etc.).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Domain user, as read from the user directory.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    /// Login name; doubles as the email address for password-reset flows.
    pub login: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
}

/// Fields for creating a new user record.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub login: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
}

/// Client device identity derived from request headers.
///
/// Both fields are opaque strings (`user-agent`, `x-forwarded-for`). This is
/// a session-binding key, not a cryptographic identity — it is not stable
/// across NAT or proxy changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFingerprint {
    pub ua: String,
    pub ip: String,
}

impl DeviceFingerprint {
    pub fn new(ua: impl Into<String>, ip: impl Into<String>) -> Self {
        Self {
            ua: ua.into(),
            ip: ip.into(),
        }
    }
}

/// One active device session for one user.
///
/// At most one record exists per (user_id, fingerprint) pair; the store does
/// not enforce this, login serializes its check-then-act per key instead.
#[derive(Debug, Clone)]
pub struct RefreshSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub fingerprint: DeviceFingerprint,
    /// The current refresh token issued to this device. Overwritten in place
    /// when a login rotates an expired session.
    pub refresh_token: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for creating a new session record; the store generates the id.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: Uuid,
    pub fingerprint: DeviceFingerprint,
    pub refresh_token: String,
}

/// JWT claims embedded in access and refresh tokens.
///
/// Carries only the subject — no role or permission claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject — user ID (standard JWT `sub` claim).
    pub sub: String,
    /// Expiry (unix timestamp).
    pub exp: i64,
    /// Issued at (unix timestamp).
    pub iat: i64,
}

/// A signed token together with its lifetime in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_in: i64,
}

/// Access + refresh token pair returned by login.
///
/// Never persisted as a whole: the refresh token's current instance is
/// mirrored into `RefreshSession.refresh_token`, the access token lives only
/// in the response.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}
