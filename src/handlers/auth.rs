// src/handlers/auth.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    config::Config,
    db::users,
    error::AppError,
    extractors::Json,
    models::user::{AuthResponse, LoginRequest, RegisterRequest, UserResponse},
    utils::{
        hash::{hash_password, verify_password},
        jwt::sign_jwt,
    },
};

/// Registers a new user.
///
/// Hashes the password using Argon2 before storing it.
/// Returns 201 Created with a credential and the user (excluding password).
pub async fn register(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let payload = RegisterRequest {
        username: payload.username.trim().to_string(),
        email: payload.email.trim().to_lowercase(),
        password: payload.password,
    };
    payload.validate()?;

    let hashed_password = hash_password(&payload.password)?;

    let user = users::insert(&pool, &payload.username, &payload.email, &hashed_password).await?;

    tracing::info!("Registered user {} ({})", user.id, user.username);

    let token = sign_jwt(user.id, &config.jwt_secret, config.jwt_expiration)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: UserResponse::from(user),
        }),
    ))
}

/// Authenticates a user by email and password and returns a credential.
///
/// Unknown email and wrong password produce the same error.
pub async fn login(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let email = payload.email.trim().to_lowercase();
    let invalid = || AppError::AuthError("Invalid email or password".to_string());

    let user = users::find_by_email(&pool, &email)
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&payload.password, &user.password)? {
        return Err(invalid());
    }

    let token = sign_jwt(user.id, &config.jwt_secret, config.jwt_expiration)?;

    Ok(Json(AuthResponse {
        token,
        user: UserResponse::from(user),
    }))
}
