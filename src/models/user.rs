// src/models/user.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::post::PostResponse;

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,

    /// Unique username.
    pub username: String,

    /// Unique, stored lower-cased.
    pub email: String,

    /// Argon2 password hash.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password: String,

    pub bio: Option<String>,

    /// Public URL of the profile picture blob.
    pub profile_picture: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// Account fields as returned to the account owner (never the password).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub bio: String,
    pub profile_picture: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            bio: user.bio.unwrap_or_default(),
            profile_picture: user.profile_picture.filter(|p| !p.is_empty()),
            created_at: user.created_at,
        }
    }
}

/// Profile with the user's posts, newest first.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub posts: Vec<PostResponse>,
}

/// Owner info embedded in post and comment listings.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub profile_picture: Option<String>,
}

/// Owner info embedded in a post detail view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub id: i64,
    pub username: String,
    pub bio: String,
    pub profile_picture: Option<String>,
}

impl From<User> for PublicProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            bio: user.bio.unwrap_or_default(),
            profile_picture: user.profile_picture.filter(|p| !p.is_empty()),
        }
    }
}

/// DTO for creating a new user (Registration).
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(
        min = 3,
        max = 30,
        message = "Username length must be between 3 and 30 characters."
    ))]
    pub username: String,

    #[validate(email(message = "Email address is invalid."))]
    pub email: String,

    #[validate(length(
        min = 6,
        max = 128,
        message = "Password length must be between 6 and 128 characters."
    ))]
    pub password: String,
}

/// DTO for user login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 254, message = "Email is required."))]
    pub email: String,
    #[validate(length(min = 1, max = 128, message = "Password is required."))]
    pub password: String,
}

/// Credential plus the authenticated account.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}

/// Text fields of the multipart profile update. Absent fields stay unchanged.
#[derive(Debug, Default, Validate)]
pub struct UpdateProfileFields {
    #[validate(length(
        min = 3,
        max = 30,
        message = "Username length must be between 3 and 30 characters."
    ))]
    pub username: Option<String>,

    #[validate(email(message = "Email address is invalid."))]
    pub email: Option<String>,

    #[validate(length(max = 500, message = "Bio must be at most 500 characters."))]
    pub bio: Option<String>,
}

impl UpdateProfileFields {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none() && self.bio.is_none()
    }
}
