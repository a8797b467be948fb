use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::auth::repo_types::{User, UserPatch};
use crate::error::AuthError;

/// Persistence for users. Failures travel as `anyhow`; an email collision is
/// reported as a wrapped `AuthError::EmailInUse`.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// All users registered under `email`.
    async fn find(&self, email: &str) -> anyhow::Result<Vec<User>>;
    async fn find_one(&self, id: i64) -> anyhow::Result<Option<User>>;
    async fn create(&self, email: &str, password: &str) -> anyhow::Result<User>;
    async fn update(&self, id: i64, patch: UserPatch) -> anyhow::Result<Option<User>>;
    async fn remove(&self, id: i64) -> anyhow::Result<Option<User>>;
}

fn email_conflict(err: sqlx::Error) -> anyhow::Error {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            anyhow::Error::new(AuthError::EmailInUse)
        }
        _ => anyhow::Error::new(err),
    }
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find(&self, email: &str) -> anyhow::Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password, admin, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_all(&self.db)
        .await
        .context("find users by email")?;
        Ok(users)
    }

    async fn find_one(&self, id: i64) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password, admin, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    async fn create(&self, email: &str, password: &str) -> anyhow::Result<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password)
            VALUES ($1, $2)
            RETURNING id, email, password, admin, created_at
            "#,
        )
        .bind(email)
        .bind(password)
        .fetch_one(&self.db)
        .await
        .map_err(email_conflict)
    }

    async fn update(&self, id: i64, patch: UserPatch) -> anyhow::Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET email = COALESCE($2, email),
                   password = COALESCE($3, password)
             WHERE id = $1
            RETURNING id, email, password, admin, created_at
            "#,
        )
        .bind(id)
        .bind(patch.email)
        .bind(patch.password)
        .fetch_optional(&self.db)
        .await
        .map_err(email_conflict)
    }

    async fn remove(&self, id: i64) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            DELETE FROM users
             WHERE id = $1
            RETURNING id, email, password, admin, created_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("delete user")?;
        Ok(user)
    }
}

#[derive(Default)]
struct UserTable {
    rows: Vec<User>,
    next_id: i64,
}

/// Process-local user store for tests and `STORE=memory` runs.
#[derive(Clone, Default)]
pub struct InMemoryUserStore {
    inner: Arc<RwLock<UserTable>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn count(&self) -> usize {
        self.inner.read().await.rows.len()
    }

    #[cfg(test)]
    pub async fn set_admin(&self, id: i64, admin: bool) -> bool {
        let mut table = self.inner.write().await;
        match table.rows.iter_mut().find(|u| u.id == id) {
            Some(user) => {
                user.admin = admin;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find(&self, email: &str) -> anyhow::Result<Vec<User>> {
        let table = self.inner.read().await;
        Ok(table.rows.iter().filter(|u| u.email == email).cloned().collect())
    }

    async fn find_one(&self, id: i64) -> anyhow::Result<Option<User>> {
        let table = self.inner.read().await;
        Ok(table.rows.iter().find(|u| u.id == id).cloned())
    }

    async fn create(&self, email: &str, password: &str) -> anyhow::Result<User> {
        let mut table = self.inner.write().await;
        if table.rows.iter().any(|u| u.email == email) {
            return Err(AuthError::EmailInUse.into());
        }
        table.next_id += 1;
        let user = User {
            id: table.next_id,
            email: email.to_string(),
            password: password.to_string(),
            admin: false,
            created_at: OffsetDateTime::now_utc(),
        };
        table.rows.push(user.clone());
        Ok(user)
    }

    async fn update(&self, id: i64, patch: UserPatch) -> anyhow::Result<Option<User>> {
        let mut table = self.inner.write().await;
        if let Some(email) = &patch.email {
            if table.rows.iter().any(|u| u.id != id && &u.email == email) {
                return Err(AuthError::EmailInUse.into());
            }
        }
        let Some(user) = table.rows.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(email) = patch.email {
            user.email = email;
        }
        if let Some(password) = patch.password {
            user.password = password;
        }
        Ok(Some(user.clone()))
    }

    async fn remove(&self, id: i64) -> anyhow::Result<Option<User>> {
        let mut table = self.inner.write().await;
        let pos = table.rows.iter().position(|u| u.id == id);
        Ok(pos.map(|i| table.rows.remove(i)))
    }
}
