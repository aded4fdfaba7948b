use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::{
    jwt::JwtKeys,
    repo::{PgUserRepository, UserRepository},
    services::AuthService,
};
use crate::config::JwtConfig;

#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub keys: JwtKeys,
}

impl AppState {
    pub fn new(db: PgPool, jwt: &JwtConfig) -> Self {
        let users = Arc::new(PgUserRepository::new(db)) as Arc<dyn UserRepository>;
        Self::from_parts(users, jwt)
    }

    pub fn from_parts(users: Arc<dyn UserRepository>, jwt: &JwtConfig) -> Self {
        let keys = JwtKeys::from_config(jwt);
        Self {
            auth: AuthService::new(users, keys.clone()),
            keys,
        }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::auth::repo::memory::InMemoryUserRepository;

        let jwt = JwtConfig {
            secret: "test".to_string(),
            ttl_minutes: 60,
        };
        Self::from_parts(Arc::new(InMemoryUserRepository::default()), &jwt)
    }
}
