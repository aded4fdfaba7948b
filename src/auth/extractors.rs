use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use super::jwt::{JwtKeys, TokenError};
use crate::error::ApiError;

/// Extracts and validates the bearer JWT, yielding the user ID it names.
pub struct AuthUser(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);

        // Expect "Bearer <token>"
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::bad_request("Missing or malformed JWT"))?;

        let claims = keys.verify(token).map_err(|e| {
            warn!(error = %e, "bearer token rejected");
            match e {
                TokenError::InvalidSignature => ApiError::unauthorized("Invalid signature"),
                TokenError::Expired => {
                    ApiError::unauthorized("Token is expired, please login again")
                }
                TokenError::Malformed(_) | TokenError::Signing(_) => {
                    ApiError::unauthorized("Unauthorized access")
                }
            }
        })?;

        Ok(AuthUser(claims.id))
    }
}
