// src/extractors.rs

use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::header;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};

use crate::db::users;
use crate::error::AppError;
use crate::state::AppState;
use crate::utils::jwt::verify_jwt;

/// JSON body whose rejection is an `AppError`, so a malformed body gets the
/// usual `{message}` response with status 400.
#[derive(FromRequest, Debug, Clone, Copy, Default)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct Json<T>(pub T);

impl<T: serde::Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

#[derive(FromRequestParts, Debug, Clone, Copy, Default)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct Path<T>(pub T);

#[derive(FromRequestParts, Debug, Clone, Copy, Default)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct Query<T>(pub T);

/// Multipart body; a request that is not `multipart/form-data` is a 400.
pub struct Multipart(pub axum::extract::Multipart);

impl<S> FromRequest<S> for Multipart
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let multipart = axum::extract::Multipart::from_request(req, state).await?;
        Ok(Multipart(multipart))
    }
}

/// The authenticated caller, resolved from the bearer credential.
///
/// Protected handlers take this as an argument; a request without a valid
/// credential never reaches them.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub email: String,
}

impl AuthUser {
    /// Fails with `Forbidden` unless the caller is `owner_id`.
    pub fn ensure_owns(&self, owner_id: i64, action: &str) -> Result<(), AppError> {
        if self.id == owner_id {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!("Not authorized to {}", action)))
        }
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::AuthError("Not authorized, no token".to_string()))?;

        let claims = verify_jwt(token, &state.config.jwt_secret)?;
        let user_id = claims.user_id()?;

        let user = users::find_by_id(&state.pool, user_id)
            .await?
            .ok_or_else(|| AppError::AuthError("User not found".to_string()))?;

        Ok(AuthUser {
            id: user.id,
            username: user.username,
            email: user.email,
        })
    }
}

/// Extracts `<token>` from an `Authorization: Bearer <token>` header.
fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
