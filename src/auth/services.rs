use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::auth::{
    jwt::{JwtKeys, TokenError},
    password::{hash_password, verify_password, PasswordError},
    repo::UserRepository,
    repo_types::{NewUser, StoreError, User},
};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("email already exists")]
    EmailTaken,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("user not found")]
    UserNotFound,
    #[error(transparent)]
    Hashing(#[from] PasswordError),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// Registration input; `password` is plaintext until `register` hashes it.
#[derive(Debug, Clone)]
pub struct RegisterUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    keys: JwtKeys,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserRepository>, keys: JwtKeys) -> Self {
        Self { users, keys }
    }

    #[cfg(test)]
    pub fn keys(&self) -> &JwtKeys {
        &self.keys
    }

    /// The existence check is a fast path only; the store's unique index is
    /// what actually guarantees one account per email.
    #[instrument(skip(self, candidate), fields(email = %candidate.email))]
    pub async fn register(&self, candidate: RegisterUser) -> Result<User, AuthError> {
        match self.users.find_by_email(&candidate.email).await {
            Ok(_) => {
                warn!("email already registered");
                return Err(AuthError::EmailTaken);
            }
            Err(StoreError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }

        let hash = hash_password(&candidate.password)?;
        let RegisterUser {
            first_name,
            last_name,
            email,
            ..
        } = candidate;

        let user = self
            .users
            .create(NewUser::new(first_name, last_name, email, hash))
            .await
            .map_err(|e| match e {
                StoreError::DuplicateEmail => {
                    warn!("lost registration race on unique email");
                    AuthError::EmailTaken
                }
                other => other.into(),
            })?;

        info!(user_id = user.id, "user registered");
        Ok(user)
    }

    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    pub async fn login(&self, credentials: Credentials) -> Result<String, AuthError> {
        let user = match self.users.find_by_email(&credentials.email).await {
            Ok(u) => u,
            Err(StoreError::NotFound) => {
                warn!("login unknown email");
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        };

        if !verify_password(&credentials.password, &user.password) {
            warn!(user_id = user.id, "login invalid password");
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.keys.issue(user.id)?;
        info!(
            user_id = user.id,
            ttl_secs = self.keys.ttl().as_secs(),
            "user logged in"
        );
        Ok(token)
    }

    pub async fn profile(&self, user_id: i64) -> Result<User, AuthError> {
        self.users.find_by_id(user_id).await.map_err(|e| match e {
            StoreError::NotFound => {
                debug!(user_id, "token subject has no live user");
                AuthError::UserNotFound
            }
            other => other.into(),
        })
    }
}
