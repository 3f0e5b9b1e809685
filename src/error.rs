// src/error.rs

use axum::{
    Json,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use crate::blob::BlobError;

/// Global Application Error Enum.
/// Every handler failure is translated into a JSON `{ "message": ... }` body.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request (missing or malformed input)
    BadRequest(String),

    // 401 Unauthorized (missing or invalid credential)
    AuthError(String),

    // 403 Forbidden (authenticated, but not the owner)
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 400 Bad Request (already liked, not liked, duplicate username/email)
    Conflict(String),

    // 500, the primary write went through but a follow-up write did not
    PartialFailure(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InternalServerError(_) | AppError::PartialFailure(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::BadRequest(_) | AppError::Conflict(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                json!({ "message": "Internal Server Error" })
            }
            AppError::PartialFailure(msg) => {
                tracing::error!("Partial failure: {}", msg);
                json!({ "message": msg, "partial": true })
            }
            AppError::BadRequest(msg)
            | AppError::AuthError(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg) => json!({ "message": msg }),
        };

        (status, Json(body)).into_response()
    }
}

/// Converts `sqlx::Error` into `AppError::InternalServerError`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::BadRequest(err.body_text())
    }
}

// Extractor rejections are reported as validation errors.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<BlobError> for AppError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::UnsupportedFormat(_) => AppError::BadRequest(err.to_string()),
            _ => AppError::InternalServerError(err.to_string()),
        }
    }
}

/// Maps a unique-constraint violation onto `Conflict`, anything else onto a 500.
pub fn map_unique_violation(err: sqlx::Error, message: impl Into<String>) -> AppError {
    let is_unique = err
        .as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation());

    if is_unique {
        AppError::Conflict(message.into())
    } else {
        AppError::from(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_is_distinct_from_unauthenticated() {
        assert_eq!(
            AppError::Forbidden("not yours".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::AuthError("no token".into()).status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn conflict_is_reported_as_client_error() {
        assert_eq!(
            AppError::Conflict("Post already liked".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
