use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{LoginRequest, PublicUser, RegisterRequest, RegisteredUser, TokenData},
        extractors::AuthUser,
    },
    error::ApiError,
    response::respond,
    state::AppState,
    validation::ValidatedJson,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/register", post(register))
        .route("/users/login", post(login))
        .route("/users/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .auth
        .register(payload.into())
        .await
        .map_err(|e| ApiError::from_auth(e, "Failed to register user"))?;

    Ok(respond(
        StatusCode::CREATED,
        "User created successfully",
        RegisteredUser::from(user),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let token = state
        .auth
        .login(payload.into())
        .await
        .map_err(|e| ApiError::from_auth(e, "Failed to login"))?;

    Ok(respond(
        StatusCode::OK,
        "User logged in successfully",
        TokenData { token },
    ))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .auth
        .profile(user_id)
        .await
        .map_err(|e| ApiError::from_auth(e, "Failed to load user"))?;

    Ok(respond(
        StatusCode::OK,
        "User retrieved successfully",
        PublicUser::from(user),
    ))
}
