//! Email verification codes for password reset.
//!
//! Codes live in the key-value cache keyed by email address. The cache never
//! expires entries, so staleness is enforced here at read time: anything
//! older than `CODE_TTL` is reported as absent, exactly like a missing code.
//! Single use comes from the explicit `invalidate` after a successful reset.

use chrono::Utc;
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::AuthError;
use crate::cache::Cache;

/// Verification codes older than this are treated as absent.
pub const CODE_TTL_SECS: i64 = 15 * 60;

/// Code length in characters.
const CODE_LEN: usize = 64;

#[derive(Serialize, Deserialize)]
struct StoredCode {
    code: String,
    issued_at: i64,
}

/// Generate a cryptographically random code (64 alphanumeric chars).
fn generate_code() -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(CODE_LEN)
        .map(char::from)
        .collect()
}

/// Issue a fresh code for `email`, overwriting any prior one.
pub async fn issue(cache: &dyn Cache, email: &str) -> Result<String, AuthError> {
    let code = generate_code();
    let entry = StoredCode {
        code: code.clone(),
        issued_at: Utc::now().timestamp(),
    };
    let value = serde_json::to_string(&entry)
        .map_err(|e| AuthError::Internal(format!("encode verification code: {e}")))?;
    cache.set(email, &value).await?;
    debug!(email, "verification code issued");
    Ok(code)
}

/// The live code on file for `email`, if any.
///
/// Absent, unparseable, and stale entries all collapse to `None` so callers
/// cannot distinguish "no code" from "wrong code".
pub async fn peek(cache: &dyn Cache, email: &str) -> Result<Option<String>, AuthError> {
    let Some(value) = cache.get(email).await? else {
        return Ok(None);
    };
    let Ok(entry) = serde_json::from_str::<StoredCode>(&value) else {
        return Ok(None);
    };
    if Utc::now().timestamp() - entry.issued_at > CODE_TTL_SECS {
        return Ok(None);
    }
    Ok(Some(entry.code))
}

/// Remove the code on file for `email`.
pub async fn invalidate(cache: &dyn Cache, email: &str) -> Result<(), AuthError> {
    cache.delete(email).await?;
    Ok(())
}
