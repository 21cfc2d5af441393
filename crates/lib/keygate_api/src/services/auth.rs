//! Auth orchestration — the state machine tying credential verification,
//! the session store, token issuance, and the verification-code flow
//! together for login, refresh, logout, and password reset.

use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use keygate_core::auth::jwt::TokenSigners;
use keygate_core::auth::password::{hash_password, verify_password};
use keygate_core::auth::sessions::{SessionFilter, SessionStore};
use keygate_core::auth::{AuthError, verification};
use keygate_core::cache::Cache;
use keygate_core::directory::UserDirectory;
use keygate_core::mail::{MailMessage, Mailer};
use keygate_core::models::auth::{
    DeviceFingerprint, IssuedToken, NewSession, NewUser, TokenPair, User,
};
use keygate_core::sync::KeyedLocks;

/// Auth orchestration over the collaborator contracts. Cheap to clone;
/// everything behind it is shared.
#[derive(Clone)]
pub struct AuthService {
    sessions: Arc<dyn SessionStore>,
    directory: Arc<dyn UserDirectory>,
    cache: Arc<dyn Cache>,
    mailer: Arc<dyn Mailer>,
    signers: TokenSigners,
    login_locks: Arc<KeyedLocks>,
}

impl AuthService {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        directory: Arc<dyn UserDirectory>,
        cache: Arc<dyn Cache>,
        mailer: Arc<dyn Mailer>,
        signers: TokenSigners,
    ) -> Self {
        Self {
            sessions,
            directory,
            cache,
            mailer,
            signers,
            login_locks: Arc::new(KeyedLocks::new()),
        }
    }

    /// Validate a login/password pair against the directory's stored hash.
    async fn verify_credentials(&self, login: &str, password: &str) -> Result<User, AuthError> {
        let user = self
            .directory
            .find_by_login(login)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        if !verify_password(password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(user)
    }

    /// Authenticate and bind a session to the calling device.
    ///
    /// A device with no session gets a fresh pair and a new record. A device
    /// whose stored refresh token still verifies is rejected with
    /// `AlreadyAuthenticated`; one whose token has expired (or fails
    /// verification for any other reason) gets a fresh pair and the record's
    /// token rotated in place. The lookup and the following create/update run
    /// under a per-(user, device) lock so concurrent logins cannot both take
    /// the "no session" branch.
    pub async fn login(
        &self,
        login: &str,
        password: &str,
        fingerprint: &DeviceFingerprint,
    ) -> Result<TokenPair, AuthError> {
        let user = self.verify_credentials(login, password).await?;

        let key = format!("{}:{}:{}", user.id, fingerprint.ua, fingerprint.ip);
        let _guard = self.login_locks.lock(&key).await;
        self.login_locks.cleanup();

        let existing = self
            .sessions
            .find(&SessionFilter::device(user.id, fingerprint))
            .await?;

        match existing.first() {
            None => {
                let pair = self.signers.issue_pair(user.id)?;
                self.sessions
                    .create(NewSession {
                        user_id: user.id,
                        fingerprint: fingerprint.clone(),
                        refresh_token: pair.refresh.token.clone(),
                    })
                    .await?;
                Ok(pair)
            }
            Some(session) => {
                if self.signers.refresh.verify(&session.refresh_token).is_ok() {
                    return Err(AuthError::AlreadyAuthenticated);
                }
                let pair = self.signers.issue_pair(user.id)?;
                self.sessions
                    .update_token_by_user(user.id, &pair.refresh.token)
                    .await?;
                Ok(pair)
            }
        }
    }

    /// Create a new user record.
    pub async fn register(
        &self,
        login: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<User, AuthError> {
        let hash = hash_password(password)?;
        self.directory
            .create(NewUser {
                login: login.into(),
                first_name: first_name.into(),
                last_name: last_name.into(),
                password_hash: hash,
            })
            .await
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// The token must match a stored session for the calling device — an
    /// unrecognized refresh token is never trusted even if its signature is
    /// valid. Expired and tampered tokens fail identically. The stored
    /// refresh token is not rotated here.
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
        fingerprint: &DeviceFingerprint,
    ) -> Result<IssuedToken, AuthError> {
        let sessions = self
            .sessions
            .find(&SessionFilter::token(fingerprint, refresh_token))
            .await?;
        let session = sessions.into_iter().next().ok_or(AuthError::SessionNotFound)?;

        self.signers
            .refresh
            .verify(refresh_token)
            .map_err(|_| AuthError::InvalidRefreshToken)?;

        self.signers.access.issue(session.user_id)
    }

    /// Drop the calling device's session. Idempotent.
    pub async fn logout(
        &self,
        user_id: Uuid,
        fingerprint: &DeviceFingerprint,
    ) -> Result<(), AuthError> {
        self.sessions.delete_by_user(user_id, Some(fingerprint)).await
    }

    /// Drop every session of the user, across all devices.
    pub async fn logout_all(&self, user_id: Uuid) -> Result<(), AuthError> {
        self.sessions.delete_by_user(user_id, None).await
    }

    /// Issue a verification code for `email` and dispatch it by mail.
    ///
    /// Mail delivery is fire-and-forget: the spawned send never blocks or
    /// fails this call, failures are only logged.
    pub async fn send_verification_code(&self, email: &str) -> Result<(), AuthError> {
        let code = verification::issue(self.cache.as_ref(), email).await?;

        let message = MailMessage {
            to: email.to_owned(),
            subject: "Verification Code".into(),
            html_body: format!("<b>Verification code: {code}</b>"),
        };
        let mailer = self.mailer.clone();
        tokio::spawn(async move {
            if let Err(err) = mailer.send(message).await {
                warn!(%err, "verification code mail dispatch failed");
            }
        });
        Ok(())
    }

    /// Reset a user's password, gated by the emailed verification code.
    ///
    /// The supplied code is compared against the stored value here; a missing,
    /// stale, or mismatched code fails identically. The entry is deleted only
    /// after the password update succeeds, making the code single-use.
    pub async fn reset_password(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let stored = verification::peek(self.cache.as_ref(), email).await?;
        if stored.as_deref() != Some(code) {
            return Err(AuthError::InvalidVerificationCode);
        }

        let hash = hash_password(new_password)?;
        self.directory.update_password_by_login(email, &hash).await?;
        verification::invalidate(self.cache.as_ref(), email).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use keygate_core::auth::jwt::TokenConfig;
    use keygate_core::auth::sessions::MemorySessionStore;
    use keygate_core::cache::MemoryCache;
    use keygate_core::directory::MemoryUserDirectory;
    use keygate_core::mail::MockMailer;

    const ACCESS: &str = "test-access-secret";
    const REFRESH: &str = "test-refresh-secret";

    fn signers(access_secs: i64, refresh_secs: i64) -> TokenSigners {
        TokenSigners::new(
            &TokenConfig {
                secret: ACCESS.into(),
                expires_in: access_secs,
            },
            &TokenConfig {
                secret: REFRESH.into(),
                expires_in: refresh_secs,
            },
        )
    }

    struct Harness {
        service: AuthService,
        sessions: Arc<MemorySessionStore>,
        mailer: Arc<MockMailer>,
    }

    fn harness(signers: TokenSigners) -> Harness {
        let sessions = Arc::new(MemorySessionStore::new());
        let mailer = Arc::new(MockMailer::new());
        let service = AuthService::new(
            sessions.clone(),
            Arc::new(MemoryUserDirectory::new()),
            Arc::new(MemoryCache::new()),
            mailer.clone(),
            signers,
        );
        Harness {
            service,
            sessions,
            mailer,
        }
    }

    fn fp(name: &str) -> DeviceFingerprint {
        DeviceFingerprint::new(name, "198.51.100.7")
    }

    async fn register(h: &Harness) -> User {
        h.service
            .register("ada@b.com", "hunter2", "Ada", "Lovelace")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn login_then_refresh_returns_access_for_same_user() {
        let h = harness(signers(900, 3600));
        let user = register(&h).await;

        let pair = h.service.login("ada@b.com", "hunter2", &fp("laptop")).await.unwrap();
        let access = h
            .service
            .refresh_token(&pair.refresh.token, &fp("laptop"))
            .await
            .unwrap();

        let claims = h.service.signers.access.verify(&access.token).unwrap();
        assert_eq!(claims.sub, user.id.to_string());
    }

    #[tokio::test]
    async fn login_with_wrong_password_fails() {
        let h = harness(signers(900, 3600));
        register(&h).await;
        assert!(matches!(
            h.service.login("ada@b.com", "wrong", &fp("laptop")).await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            h.service.login("ghost@b.com", "hunter2", &fp("laptop")).await,
            Err(AuthError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn second_login_with_live_session_is_rejected() {
        let h = harness(signers(900, 3600));
        register(&h).await;

        h.service.login("ada@b.com", "hunter2", &fp("laptop")).await.unwrap();
        assert!(matches!(
            h.service.login("ada@b.com", "hunter2", &fp("laptop")).await,
            Err(AuthError::AlreadyAuthenticated)
        ));
    }

    #[tokio::test]
    async fn login_after_refresh_expiry_rotates_in_place() {
        // Refresh tokens are born expired, so the second login takes the
        // rotation branch.
        let h = harness(signers(900, -10));
        let user = register(&h).await;

        let first = h.service.login("ada@b.com", "hunter2", &fp("laptop")).await.unwrap();
        let second = h.service.login("ada@b.com", "hunter2", &fp("laptop")).await.unwrap();
        assert_ne!(first.refresh.token, second.refresh.token);

        // Still exactly one record for the device, holding the new token.
        let rows = h
            .sessions
            .find(&SessionFilter::device(user.id, &fp("laptop")))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].refresh_token, second.refresh.token);
    }

    #[tokio::test]
    async fn same_user_different_devices_get_separate_sessions() {
        let h = harness(signers(900, 3600));
        let user = register(&h).await;

        h.service.login("ada@b.com", "hunter2", &fp("laptop")).await.unwrap();
        h.service.login("ada@b.com", "hunter2", &fp("phone")).await.unwrap();

        let all = h
            .sessions
            .find(&SessionFilter {
                user_id: Some(user.id),
                ..SessionFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn refresh_with_unknown_token_fails_before_verification() {
        let h = harness(signers(900, 3600));
        let user = register(&h).await;

        // A validly-signed token that no session row holds is never trusted.
        let foreign = h.service.signers.refresh.issue(user.id).unwrap();
        assert!(matches!(
            h.service.refresh_token(&foreign.token, &fp("laptop")).await,
            Err(AuthError::SessionNotFound)
        ));
    }

    #[tokio::test]
    async fn refresh_with_foreign_signed_token_fails_even_with_matching_row() {
        let h = harness(signers(900, 3600));
        let user = register(&h).await;

        // A session row whose stored token was signed by someone else.
        let foreign = TokenSigners::new(
            &TokenConfig {
                secret: "other-access".into(),
                expires_in: 900,
            },
            &TokenConfig {
                secret: "other-refresh".into(),
                expires_in: 3600,
            },
        )
        .refresh
        .issue(user.id)
        .unwrap();
        h.sessions
            .create(NewSession {
                user_id: user.id,
                fingerprint: fp("laptop"),
                refresh_token: foreign.token.clone(),
            })
            .await
            .unwrap();

        assert!(matches!(
            h.service.refresh_token(&foreign.token, &fp("laptop")).await,
            Err(AuthError::InvalidRefreshToken)
        ));
    }

    #[tokio::test]
    async fn refresh_from_wrong_device_fails() {
        let h = harness(signers(900, 3600));
        register(&h).await;

        let pair = h.service.login("ada@b.com", "hunter2", &fp("laptop")).await.unwrap();
        assert!(matches!(
            h.service.refresh_token(&pair.refresh.token, &fp("phone")).await,
            Err(AuthError::SessionNotFound)
        ));
    }

    #[tokio::test]
    async fn logout_removes_only_that_device() {
        let h = harness(signers(900, 3600));
        let user = register(&h).await;

        h.service.login("ada@b.com", "hunter2", &fp("laptop")).await.unwrap();
        let phone = h.service.login("ada@b.com", "hunter2", &fp("phone")).await.unwrap();

        h.service.logout(user.id, &fp("laptop")).await.unwrap();

        // The other device's session still refreshes.
        assert!(
            h.service
                .refresh_token(&phone.refresh.token, &fp("phone"))
                .await
                .is_ok()
        );
        // Logging out again is not an error.
        h.service.logout(user.id, &fp("laptop")).await.unwrap();
    }

    #[tokio::test]
    async fn logout_all_kills_every_device() {
        let h = harness(signers(900, 3600));
        let user = register(&h).await;

        let laptop = h.service.login("ada@b.com", "hunter2", &fp("laptop")).await.unwrap();
        let phone = h.service.login("ada@b.com", "hunter2", &fp("phone")).await.unwrap();

        h.service.logout_all(user.id).await.unwrap();

        for (pair, device) in [(laptop, "laptop"), (phone, "phone")] {
            assert!(matches!(
                h.service.refresh_token(&pair.refresh.token, &fp(device)).await,
                Err(AuthError::SessionNotFound)
            ));
        }
    }

    #[tokio::test]
    async fn verification_code_resets_password_once() {
        let h = harness(signers(900, 3600));
        register(&h).await;

        h.service.send_verification_code("ada@b.com").await.unwrap();
        let code = verification::peek(h.service.cache.as_ref(), "ada@b.com")
            .await
            .unwrap()
            .unwrap();

        h.service
            .reset_password("ada@b.com", &code, "newpass")
            .await
            .unwrap();
        // Old password no longer works, new one does.
        assert!(matches!(
            h.service.login("ada@b.com", "hunter2", &fp("laptop")).await,
            Err(AuthError::InvalidCredentials)
        ));
        h.service.login("ada@b.com", "newpass", &fp("laptop")).await.unwrap();

        // The code was consumed by the successful reset.
        assert!(matches!(
            h.service.reset_password("ada@b.com", &code, "again").await,
            Err(AuthError::InvalidVerificationCode)
        ));
    }

    #[tokio::test]
    async fn reset_with_wrong_code_fails() {
        let h = harness(signers(900, 3600));
        register(&h).await;

        h.service.send_verification_code("ada@b.com").await.unwrap();
        assert!(matches!(
            h.service.reset_password("ada@b.com", "wrong", "newpass").await,
            Err(AuthError::InvalidVerificationCode)
        ));
        // No code on file behaves identically.
        assert!(matches!(
            h.service.reset_password("no-code@b.com", "wrong", "x").await,
            Err(AuthError::InvalidVerificationCode)
        ));
    }

    #[tokio::test]
    async fn verification_mail_carries_the_code() {
        let h = harness(signers(900, 3600));

        h.service.send_verification_code("ada@b.com").await.unwrap();
        let code = verification::peek(h.service.cache.as_ref(), "ada@b.com")
            .await
            .unwrap()
            .unwrap();

        // The send is spawned; give it a few ticks to land.
        for _ in 0..100 {
            if !h.mailer.sent().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        let sent = h.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "ada@b.com");
        assert!(sent[0].html_body.contains(&code));
    }

    #[tokio::test]
    async fn concurrent_logins_from_one_device_create_one_session() {
        let h = harness(signers(900, 3600));
        let user = register(&h).await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let service = h.service.clone();
            handles.push(tokio::spawn(async move {
                service.login("ada@b.com", "hunter2", &fp("laptop")).await
            }));
        }
        let results: Vec<_> = join_all(handles).await;

        // Exactly one login wins; the rest see the live session.
        let ok = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(ok, 1);
        let rows = h
            .sessions
            .find(&SessionFilter::device(user.id, &fp("laptop")))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    async fn join_all(
        handles: Vec<tokio::task::JoinHandle<Result<TokenPair, AuthError>>>,
    ) -> Vec<Result<TokenPair, AuthError>> {
        let mut out = Vec::with_capacity(handles.len());
        for handle in handles {
            out.push(handle.await.unwrap());
        }
        out
    }
}
