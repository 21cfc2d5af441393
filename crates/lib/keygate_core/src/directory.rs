//! User directory contract.
//!
//! User storage is an external collaborator: the auth flows only read a
//! user's identifier and password hash and write a new hash on reset. The
//! Postgres implementation lives here so the server binary has a default;
//! everything else goes through the trait.

use async_trait::async_trait;
use dashmap::DashMap;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::AuthError;
use crate::models::auth::{NewUser, User};

/// Narrow user-lookup/update contract.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_login(&self, login: &str) -> Result<Option<User>, AuthError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError>;
    async fn create(&self, user: NewUser) -> Result<User, AuthError>;
    /// Overwrite the stored password hash for the user whose login (email)
    /// matches. Missing users fail with `UserNotFound`.
    async fn update_password_by_login(
        &self,
        login: &str,
        password_hash: &str,
    ) -> Result<(), AuthError>;
}

type UserRow = (Uuid, String, String, String, String);

fn row_to_user((id, login, first_name, last_name, password_hash): UserRow) -> User {
    User {
        id,
        login,
        first_name,
        last_name,
        password_hash,
    }
}

/// Postgres-backed user directory.
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_by_login(&self, login: &str) -> Result<Option<User>, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, login, first_name, last_name, password_hash \
             FROM users WHERE login = $1",
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(row_to_user))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, login, first_name, last_name, password_hash \
             FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(row_to_user))
    }

    async fn create(&self, user: NewUser) -> Result<User, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(
            "INSERT INTO users (login, first_name, last_name, password_hash) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, login, first_name, last_name, password_hash",
        )
        .bind(&user.login)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AuthError::Directory(format!("login '{}' already registered", user.login))
            }
            other => AuthError::Store(other),
        })?;
        Ok(row_to_user(row))
    }

    async fn update_password_by_login(
        &self,
        login: &str,
        password_hash: &str,
    ) -> Result<(), AuthError> {
        let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE login = $1")
            .bind(login)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AuthError::UserNotFound);
        }
        Ok(())
    }
}

/// In-memory directory for tests and examples.
#[derive(Default)]
pub struct MemoryUserDirectory {
    users: DashMap<Uuid, User>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_by_login(&self, login: &str) -> Result<Option<User>, AuthError> {
        Ok(self
            .users
            .iter()
            .find(|u| u.login == login)
            .map(|u| u.clone()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError> {
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn create(&self, user: NewUser) -> Result<User, AuthError> {
        if self.find_by_login(&user.login).await?.is_some() {
            return Err(AuthError::Directory(format!(
                "login '{}' already registered",
                user.login
            )));
        }
        let created = User {
            id: Uuid::new_v4(),
            login: user.login,
            first_name: user.first_name,
            last_name: user.last_name,
            password_hash: user.password_hash,
        };
        self.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_password_by_login(
        &self,
        login: &str,
        password_hash: &str,
    ) -> Result<(), AuthError> {
        let id = self
            .users
            .iter()
            .find(|u| u.login == login)
            .map(|u| u.id)
            .ok_or(AuthError::UserNotFound)?;
        if let Some(mut user) = self.users.get_mut(&id) {
            user.password_hash = password_hash.to_owned();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(login: &str) -> NewUser {
        NewUser {
            login: login.into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            password_hash: "hash".into(),
        }
    }

    #[tokio::test]
    async fn create_then_find() {
        let dir = MemoryUserDirectory::new();
        let created = dir.create(new_user("ada@b.com")).await.unwrap();
        let found = dir.find_by_login("ada@b.com").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert!(dir.find_by_id(created.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn duplicate_login_is_rejected() {
        let dir = MemoryUserDirectory::new();
        dir.create(new_user("ada@b.com")).await.unwrap();
        assert!(matches!(
            dir.create(new_user("ada@b.com")).await,
            Err(AuthError::Directory(_))
        ));
    }

    #[tokio::test]
    async fn password_update_requires_existing_user() {
        let dir = MemoryUserDirectory::new();
        assert!(matches!(
            dir.update_password_by_login("ghost@b.com", "h").await,
            Err(AuthError::UserNotFound)
        ));
        dir.create(new_user("ada@b.com")).await.unwrap();
        dir.update_password_by_login("ada@b.com", "new-hash")
            .await
            .unwrap();
        let user = dir.find_by_login("ada@b.com").await.unwrap().unwrap();
        assert_eq!(user.password_hash, "new-hash");
    }
}
