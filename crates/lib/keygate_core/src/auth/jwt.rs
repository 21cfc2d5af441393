//! JWT token issuance and verification.
//!
//! Access and refresh tokens use the same HS256 scheme but distinct secrets
//! and lifetimes; each (secret, lifetime) pair is one `TokenSigner`.

use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;
use uuid::Uuid;

use super::AuthError;
use crate::models::auth::{IssuedToken, TokenClaims, TokenPair};

/// Token verification failures. Callers that must not leak the distinction
/// (the refresh flow) collapse both variants into one error.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("token signature invalid")]
    InvalidSignature,
}

/// One (secret, lifetime) signing configuration.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub secret: String,
    pub expires_in: i64,
}

/// Stateless HS256 signer/verifier for one token class.
#[derive(Clone)]
pub struct TokenSigner {
    secret: String,
    expires_in: i64,
}

impl TokenSigner {
    pub fn new(config: &TokenConfig) -> Self {
        Self {
            secret: config.secret.clone(),
            expires_in: config.expires_in,
        }
    }

    /// Sign a token carrying only the subject identifier.
    pub fn issue(&self, subject: Uuid) -> Result<IssuedToken, AuthError> {
        let now = Utc::now();
        let claims = TokenClaims {
            sub: subject.to_string(),
            exp: now.timestamp() + self.expires_in,
            iat: now.timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AuthError::Token(format!("jwt encode: {e}")))?;
        Ok(IssuedToken {
            token,
            expires_in: self.expires_in,
        })
    }

    /// Verify signature and expiry, returning the claims on success.
    ///
    /// Expiry is checked twice: by jsonwebtoken's validation (zero leeway)
    /// and again explicitly against the decoded claims, so an unexpired-
    /// looking token never passes on validation settings alone.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let key = DecodingKey::from_secret(self.secret.as_bytes());
        let mut validation = Validation::default();
        validation.validate_exp = true;
        validation.leeway = 0;
        let claims = decode::<TokenClaims>(token, &key, &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::InvalidSignature,
            })?
            .claims;
        if claims.exp < Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

/// The two signers every flow needs, built once from configuration.
#[derive(Clone)]
pub struct TokenSigners {
    pub access: TokenSigner,
    pub refresh: TokenSigner,
}

impl TokenSigners {
    pub fn new(access: &TokenConfig, refresh: &TokenConfig) -> Self {
        Self {
            access: TokenSigner::new(access),
            refresh: TokenSigner::new(refresh),
        }
    }

    /// Mint a fresh access + refresh pair for one subject.
    pub fn issue_pair(&self, subject: Uuid) -> Result<TokenPair, AuthError> {
        Ok(TokenPair {
            access: self.access.issue(subject)?,
            refresh: self.refresh.issue(subject)?,
        })
    }
}
