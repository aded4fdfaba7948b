use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::repo_types::User;
use crate::auth::services::{Credentials, RegisterUser};
use crate::validation::{validate_email, FieldTags};

/// Request body for user registration.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(required, length(min = 2, max = 255))]
    pub first_name: Option<String>,
    #[validate(required, length(min = 2, max = 255))]
    pub last_name: Option<String>,
    #[validate(required, custom(function = "validate_email"))]
    pub email: Option<String>,
    #[validate(required, length(min = 6))]
    pub password: Option<String>,
}

impl FieldTags for RegisterRequest {
    const FIELDS: &'static [&'static str] = &["first_name", "last_name", "email", "password"];
}

impl From<RegisterRequest> for RegisterUser {
    fn from(r: RegisterRequest) -> Self {
        Self {
            first_name: r.first_name.unwrap_or_default(),
            last_name: r.last_name.unwrap_or_default(),
            email: r.email.unwrap_or_default(),
            password: r.password.unwrap_or_default(),
        }
    }
}

/// Request body for login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(required, custom(function = "validate_email"))]
    pub email: Option<String>,
    #[validate(required, length(min = 6))]
    pub password: Option<String>,
}

impl FieldTags for LoginRequest {
    const FIELDS: &'static [&'static str] = &["email", "password"];
}

impl From<LoginRequest> for Credentials {
    fn from(r: LoginRequest) -> Self {
        Self {
            email: r.email.unwrap_or_default(),
            password: r.password.unwrap_or_default(),
        }
    }
}

/// Echo of the created account; never includes the password.
#[derive(Debug, Serialize)]
pub struct RegisteredUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl From<User> for RegisteredUser {
    fn from(u: User) -> Self {
        Self {
            first_name: u.first_name,
            last_name: u.last_name,
            email: u.email,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenData {
    pub token: String,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            first_name: u.first_name,
            last_name: u.last_name,
            email: u.email,
        }
    }
}
