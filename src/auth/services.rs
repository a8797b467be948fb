use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use crate::auth::password::{hash_password_blocking, verify_password_blocking};
use crate::auth::repo::UserStore;
use crate::auth::repo_types::{User, UserPatch};
use crate::error::{ApiError, AuthError};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Signup and signin over a user store.
///
/// Signup checks for an existing email before inserting. Two concurrent
/// signups can both pass that check; the Postgres store's unique index then
/// rejects the loser, which surfaces here as `EmailInUse` as well.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    pub async fn signup(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let existing = self.users.find(email).await.map_err(AuthError::from_store)?;
        if !existing.is_empty() {
            warn!(email, "email already registered");
            return Err(AuthError::EmailInUse);
        }

        let encoded = hash_password_blocking(password.to_owned()).await?;
        let user = self
            .users
            .create(email, &encoded)
            .await
            .map_err(AuthError::from_store)?;

        info!(user_id = user.id, email = %user.email, "user registered");
        Ok(user)
    }

    pub async fn signin(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let user = self
            .users
            .find(email)
            .await
            .map_err(AuthError::from_store)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                warn!(email, "signin unknown email");
                AuthError::UserNotFound
            })?;

        if !verify_password_blocking(password.to_owned(), user.password.clone()).await? {
            warn!(email, user_id = user.id, "signin invalid password");
            return Err(AuthError::InvalidCredentials);
        }

        info!(user_id = user.id, "user signed in");
        Ok(user)
    }
}

/// Plain user lookups and edits.
#[derive(Clone)]
pub struct UsersService {
    users: Arc<dyn UserStore>,
}

impl UsersService {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    pub async fn find_one(&self, id: i64) -> Result<Option<User>, ApiError> {
        Ok(self.users.find_one(id).await?)
    }

    pub async fn find(&self, email: &str) -> Result<Vec<User>, ApiError> {
        Ok(self.users.find(email).await?)
    }

    /// Applies the patch; a new password is hashed before it is stored.
    pub async fn update(
        &self,
        id: i64,
        email: Option<String>,
        password: Option<String>,
    ) -> Result<User, ApiError> {
        let password = match password {
            Some(plain) => Some(hash_password_blocking(plain).await?),
            None => None,
        };
        let patch = UserPatch { email, password };
        self.users
            .update(id, patch)
            .await
            .map_err(AuthError::from_store)?
            .ok_or_else(|| ApiError::NotFound("user not found".into()))
    }

    pub async fn remove(&self, id: i64) -> Result<User, ApiError> {
        let user = self
            .users
            .remove(id)
            .await?
            .ok_or_else(|| ApiError::NotFound("user not found".into()))?;
        info!(user_id = user.id, "user removed");
        Ok(user)
    }
}
