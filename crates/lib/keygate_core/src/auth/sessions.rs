//! Refresh-session store.
//!
//! Durable per-device session records, exclusively owned and mutated by the
//! auth orchestration. The store enforces no uniqueness; callers check
//! existence before insert/update under a per-key lock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sqlx::PgPool;
use uuid::Uuid;

use super::AuthError;
use crate::models::auth::{DeviceFingerprint, NewSession, RefreshSession};
use crate::uuid::uuidv7;

/// Filter criteria over session records. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub user_id: Option<Uuid>,
    pub fingerprint: Option<DeviceFingerprint>,
    pub refresh_token: Option<String>,
}

impl SessionFilter {
    /// Sessions for one user on one device.
    pub fn device(user_id: Uuid, fingerprint: &DeviceFingerprint) -> Self {
        Self {
            user_id: Some(user_id),
            fingerprint: Some(fingerprint.clone()),
            ..Self::default()
        }
    }

    /// Sessions holding a specific refresh token on one device.
    pub fn token(fingerprint: &DeviceFingerprint, refresh_token: &str) -> Self {
        Self {
            fingerprint: Some(fingerprint.clone()),
            refresh_token: Some(refresh_token.to_owned()),
            ..Self::default()
        }
    }

    fn matches(&self, session: &RefreshSession) -> bool {
        self.user_id.is_none_or(|id| session.user_id == id)
            && self
                .fingerprint
                .as_ref()
                .is_none_or(|fp| session.fingerprint == *fp)
            && self
                .refresh_token
                .as_ref()
                .is_none_or(|t| session.refresh_token == *t)
    }
}

/// CRUD contract over refresh-session records.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// All sessions matching the filter (possibly empty).
    async fn find(&self, filter: &SessionFilter) -> Result<Vec<RefreshSession>, AuthError>;

    /// Persist a new session; the store generates the id.
    async fn create(&self, session: NewSession) -> Result<RefreshSession, AuthError>;

    /// Overwrite the refresh token of one session belonging to `user_id`
    /// (rotation). Fails with `SessionNotFound` if the user has none.
    async fn update_token_by_user(
        &self,
        user_id: Uuid,
        refresh_token: &str,
    ) -> Result<RefreshSession, AuthError>;

    /// Delete the user's session on one device, or every session when no
    /// fingerprint is given. Deleting nothing is not an error.
    async fn delete_by_user(
        &self,
        user_id: Uuid,
        fingerprint: Option<&DeviceFingerprint>,
    ) -> Result<(), AuthError>;
}

type SessionRow = (Uuid, Uuid, String, String, String, DateTime<Utc>, DateTime<Utc>);

fn row_to_session(
    (id, user_id, ua, ip, refresh_token, created_at, updated_at): SessionRow,
) -> RefreshSession {
    RefreshSession {
        id,
        user_id,
        fingerprint: DeviceFingerprint { ua, ip },
        refresh_token,
        created_at,
        updated_at,
    }
}

/// Postgres-backed session store.
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn find(&self, filter: &SessionFilter) -> Result<Vec<RefreshSession>, AuthError> {
        let rows = sqlx::query_as::<_, SessionRow>(
            "SELECT id, user_id, ua, ip, refresh_token, created_at, updated_at \
             FROM refresh_sessions \
             WHERE ($1::uuid IS NULL OR user_id = $1) \
               AND ($2::text IS NULL OR ua = $2) \
               AND ($3::text IS NULL OR ip = $3) \
               AND ($4::text IS NULL OR refresh_token = $4) \
             ORDER BY id",
        )
        .bind(filter.user_id)
        .bind(filter.fingerprint.as_ref().map(|fp| fp.ua.as_str()))
        .bind(filter.fingerprint.as_ref().map(|fp| fp.ip.as_str()))
        .bind(filter.refresh_token.as_deref())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(row_to_session).collect())
    }

    async fn create(&self, session: NewSession) -> Result<RefreshSession, AuthError> {
        let row = sqlx::query_as::<_, SessionRow>(
            "INSERT INTO refresh_sessions (id, user_id, ua, ip, refresh_token) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, user_id, ua, ip, refresh_token, created_at, updated_at",
        )
        .bind(uuidv7())
        .bind(session.user_id)
        .bind(&session.fingerprint.ua)
        .bind(&session.fingerprint.ip)
        .bind(&session.refresh_token)
        .fetch_one(&self.pool)
        .await?;
        Ok(row_to_session(row))
    }

    async fn update_token_by_user(
        &self,
        user_id: Uuid,
        refresh_token: &str,
    ) -> Result<RefreshSession, AuthError> {
        // Update-one semantics: callers hold the (user, device) lock and have
        // just found this user's session for the device, so the single row
        // picked here is that session.
        let row = sqlx::query_as::<_, SessionRow>(
            "UPDATE refresh_sessions SET refresh_token = $2, updated_at = now() \
             WHERE id = (SELECT id FROM refresh_sessions WHERE user_id = $1 ORDER BY id LIMIT 1) \
             RETURNING id, user_id, ua, ip, refresh_token, created_at, updated_at",
        )
        .bind(user_id)
        .bind(refresh_token)
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_session).ok_or(AuthError::SessionNotFound)
    }

    async fn delete_by_user(
        &self,
        user_id: Uuid,
        fingerprint: Option<&DeviceFingerprint>,
    ) -> Result<(), AuthError> {
        sqlx::query(
            "DELETE FROM refresh_sessions \
             WHERE user_id = $1 \
               AND ($2::text IS NULL OR ua = $2) \
               AND ($3::text IS NULL OR ip = $3)",
        )
        .bind(user_id)
        .bind(fingerprint.map(|fp| fp.ua.as_str()))
        .bind(fingerprint.map(|fp| fp.ip.as_str()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// In-memory session store for tests and single-process deployments.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: DashMap<Uuid, RefreshSession>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn find(&self, filter: &SessionFilter) -> Result<Vec<RefreshSession>, AuthError> {
        let mut matched: Vec<RefreshSession> = self
            .sessions
            .iter()
            .filter(|s| filter.matches(s))
            .map(|s| s.clone())
            .collect();
        matched.sort_by_key(|s| s.id);
        Ok(matched)
    }

    async fn create(&self, session: NewSession) -> Result<RefreshSession, AuthError> {
        let now = Utc::now();
        let created = RefreshSession {
            id: uuidv7(),
            user_id: session.user_id,
            fingerprint: session.fingerprint,
            refresh_token: session.refresh_token,
            created_at: now,
            updated_at: now,
        };
        self.sessions.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_token_by_user(
        &self,
        user_id: Uuid,
        refresh_token: &str,
    ) -> Result<RefreshSession, AuthError> {
        let id = self
            .sessions
            .iter()
            .filter(|s| s.user_id == user_id)
            .map(|s| s.id)
            .min()
            .ok_or(AuthError::SessionNotFound)?;
        let mut session = self.sessions.get_mut(&id).ok_or(AuthError::SessionNotFound)?;
        session.refresh_token = refresh_token.to_owned();
        session.updated_at = Utc::now();
        Ok(session.clone())
    }

    async fn delete_by_user(
        &self,
        user_id: Uuid,
        fingerprint: Option<&DeviceFingerprint>,
    ) -> Result<(), AuthError> {
        self.sessions.retain(|_, s| {
            s.user_id != user_id || fingerprint.is_some_and(|fp| s.fingerprint != *fp)
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(name: &str) -> DeviceFingerprint {
        DeviceFingerprint::new(name, "10.0.0.1")
    }

    fn new_session(user_id: Uuid, device: &str, token: &str) -> NewSession {
        NewSession {
            user_id,
            fingerprint: fp(device),
            refresh_token: token.into(),
        }
    }

    #[tokio::test]
    async fn find_by_device_returns_zero_or_one() {
        let store = MemorySessionStore::new();
        let user = Uuid::new_v4();
        assert!(
            store
                .find(&SessionFilter::device(user, &fp("laptop")))
                .await
                .unwrap()
                .is_empty()
        );

        store.create(new_session(user, "laptop", "t1")).await.unwrap();
        store.create(new_session(user, "phone", "t2")).await.unwrap();

        let found = store
            .find(&SessionFilter::device(user, &fp("laptop")))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].refresh_token, "t1");
    }

    #[tokio::test]
    async fn find_by_token_requires_matching_device() {
        let store = MemorySessionStore::new();
        let user = Uuid::new_v4();
        store.create(new_session(user, "laptop", "t1")).await.unwrap();

        let same_device = store
            .find(&SessionFilter::token(&fp("laptop"), "t1"))
            .await
            .unwrap();
        assert_eq!(same_device.len(), 1);

        // The token alone is not enough from another device.
        let other_device = store
            .find(&SessionFilter::token(&fp("phone"), "t1"))
            .await
            .unwrap();
        assert!(other_device.is_empty());
    }

    #[tokio::test]
    async fn update_rotates_in_place() {
        let store = MemorySessionStore::new();
        let user = Uuid::new_v4();
        let created = store.create(new_session(user, "laptop", "old")).await.unwrap();

        let updated = store.update_token_by_user(user, "new").await.unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.refresh_token, "new");

        let all = store.find(&SessionFilter::default()).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn update_without_sessions_fails() {
        let store = MemorySessionStore::new();
        assert!(matches!(
            store.update_token_by_user(Uuid::new_v4(), "t").await,
            Err(AuthError::SessionNotFound)
        ));
    }

    #[tokio::test]
    async fn delete_by_device_leaves_other_devices() {
        let store = MemorySessionStore::new();
        let user = Uuid::new_v4();
        store.create(new_session(user, "laptop", "t1")).await.unwrap();
        store.create(new_session(user, "phone", "t2")).await.unwrap();

        store.delete_by_user(user, Some(&fp("laptop"))).await.unwrap();

        let rest = store
            .find(&SessionFilter {
                user_id: Some(user),
                ..SessionFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].fingerprint, fp("phone"));
    }

    #[tokio::test]
    async fn delete_by_user_removes_all_devices() {
        let store = MemorySessionStore::new();
        let user = Uuid::new_v4();
        let other = Uuid::new_v4();
        store.create(new_session(user, "laptop", "t1")).await.unwrap();
        store.create(new_session(user, "phone", "t2")).await.unwrap();
        store.create(new_session(other, "laptop", "t3")).await.unwrap();

        store.delete_by_user(user, None).await.unwrap();

        assert!(
            store
                .find(&SessionFilter {
                    user_id: Some(user),
                    ..SessionFilter::default()
                })
                .await
                .unwrap()
                .is_empty()
        );
        // Other users are untouched.
        assert_eq!(
            store
                .find(&SessionFilter {
                    user_id: Some(other),
                    ..SessionFilter::default()
                })
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn delete_missing_session_is_idempotent() {
        let store = MemorySessionStore::new();
        store
            .delete_by_user(Uuid::new_v4(), Some(&fp("laptop")))
            .await
            .unwrap();
    }
}
