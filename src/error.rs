use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use tracing::error;

use crate::auth::services::AuthError;

pub const INVALID_REQUEST: &str = "Invalid Request";
pub const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Everything a handler can fail with, already sanitized for the client.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed body or failed field rules; carries the field messages.
    Validation(String),
    /// Request was well-formed but conflicts with stored state.
    Conflict { message: String, context: &'static str },
    BadRequest(String),
    Unauthorized(String),
    /// Internal detail is logged where the error is created, never sent.
    Internal(&'static str),
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    data: (),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            // Duplicate email is reported as a bad request, not 409.
            ApiError::Validation(_) | ApiError::Conflict { .. } | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn unauthorized<S: Into<String>>(msg: S) -> Self {
        ApiError::Unauthorized(msg.into())
    }

    pub fn bad_request<S: Into<String>>(msg: S) -> Self {
        ApiError::BadRequest(msg.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = match self {
            ApiError::Validation(details) => ErrorBody {
                message: INVALID_REQUEST.to_string(),
                error: Some(details),
                data: (),
            },
            ApiError::Conflict { message, context } => ErrorBody {
                message,
                error: Some(context.to_string()),
                data: (),
            },
            ApiError::BadRequest(message) | ApiError::Unauthorized(message) => ErrorBody {
                message,
                error: None,
                data: (),
            },
            ApiError::Internal(message) => ErrorBody {
                message: message.to_string(),
                error: None,
                data: (),
            },
        };
        (status, Json(body)).into_response()
    }
}

impl ApiError {
    /// Maps a service error, using `context` as the sanitized summary.
    pub fn from_auth(err: AuthError, context: &'static str) -> Self {
        match err {
            AuthError::EmailTaken => ApiError::Conflict {
                message: err.to_string(),
                context,
            },
            AuthError::InvalidCredentials => ApiError::unauthorized(INVALID_CREDENTIALS),
            AuthError::UserNotFound => ApiError::unauthorized("User not found"),
            AuthError::Hashing(_) | AuthError::Token(_) | AuthError::Storage(_) => {
                error!(error = %err, context, "request failed");
                ApiError::Internal(context)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn render(err: ApiError) -> (StatusCode, serde_json::Value) {
        let res = err.into_response();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn validation_error_shape() {
        let (status, body) = render(ApiError::Validation("email is required".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], INVALID_REQUEST);
        assert_eq!(body["error"], "email is required");
    }

    #[tokio::test]
    async fn email_taken_is_bad_request() {
        let err = ApiError::from_auth(AuthError::EmailTaken, "Failed to register user");
        let (status, body) = render(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "email already exists");
        assert_eq!(body["error"], "Failed to register user");
    }

    #[tokio::test]
    async fn storage_failure_hides_detail() {
        let err = ApiError::from_auth(
            AuthError::Storage(sqlx::Error::PoolTimedOut.into()),
            "Failed to register user",
        );
        let (status, body) = render(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Failed to register user");
        assert!(body.get("error").is_none());
        assert!(!body.to_string().contains("pool"));
    }

    #[tokio::test]
    async fn bad_credentials_are_generic() {
        let (status, body) = render(ApiError::from_auth(AuthError::InvalidCredentials, "x")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], INVALID_CREDENTIALS);
        assert!(body["data"].is_null());
    }
}
