use std::sync::Arc;

use axum::{extract::State, response::IntoResponse};
use serde_json::json;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    blob::{BlobStore, discard_blob},
    config::PROFILE_PICTURE_FOLDER,
    db::{posts, users},
    error::AppError,
    extractors::{AuthUser, Json, Multipart, Path},
    models::user::{ProfileResponse, UpdateProfileFields, User, UserResponse},
    upload::MultipartForm,
    utils::text::plain_text,
};

/// Get the caller's profile and posts.
pub async fn get_profile(
    State(pool): State<SqlitePool>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(load_profile(&pool, user.id).await?))
}

/// Get any user's public profile and posts.
pub async fn get_user(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(load_profile(&pool, id).await?))
}

/// List posts created by the caller, newest first.
pub async fn list_own_posts(
    State(pool): State<SqlitePool>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let own = posts::list_by_owner(&pool, user.id).await?;

    Ok(Json(posts::hydrate(&pool, own).await?))
}

/// Partial profile edit from a multipart form (`username`, `email`, `bio`,
/// `profilePicture`). Blank or missing fields are left unchanged.
///
/// A new picture is stored before any field changes. It replaces the old one,
/// which is removed from the blob store before the new reference is saved.
pub async fn update_profile(
    State(pool): State<SqlitePool>,
    State(blobs): State<Arc<dyn BlobStore>>,
    user: AuthUser,
    Multipart(multipart): Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut form = MultipartForm::parse(multipart, &["profilePicture"], 1).await?;

    let fields = UpdateProfileFields {
        username: form.text("username"),
        email: form.text("email").map(|email| email.to_lowercase()),
        bio: form.text("bio").map(|bio| plain_text(&bio)),
    };
    fields.validate()?;

    let current = find_user(&pool, user.id).await?;

    // Store the new picture first so a failed upload leaves the profile untouched.
    let picture = match form.take_images().pop() {
        Some(image) => Some(
            blobs
                .put(PROFILE_PICTURE_FOLDER, image.extension, image.bytes)
                .await?,
        ),
        None => None,
    };

    if let Err(e) = users::update_fields(&pool, user.id, &fields).await {
        if let Some(stored) = &picture {
            discard_blob(&pool, blobs.as_ref(), &stored.url).await;
        }
        return Err(e);
    }

    if let Some(stored) = picture {
        if let Some(old) = current.profile_picture.as_deref().filter(|p| !p.is_empty()) {
            discard_blob(&pool, blobs.as_ref(), old).await;
        }

        if let Err(e) = users::set_profile_picture(&pool, user.id, Some(&stored.url)).await {
            discard_blob(&pool, blobs.as_ref(), &stored.url).await;
            return Err(e.into());
        }

        tracing::info!("User {} replaced their profile picture", user.id);
    }

    let updated = find_user(&pool, user.id).await?;

    Ok(Json(UserResponse::from(updated)))
}

/// Remove the caller's profile picture, if any.
pub async fn delete_profile_picture(
    State(pool): State<SqlitePool>,
    State(blobs): State<Arc<dyn BlobStore>>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let current = find_user(&pool, user.id).await?;

    if let Some(picture) = current.profile_picture.filter(|p| !p.is_empty()) {
        discard_blob(&pool, blobs.as_ref(), &picture).await;
        users::set_profile_picture(&pool, user.id, None).await?;
    }

    Ok(Json(json!({ "message": "Profile picture deleted successfully" })))
}

async fn find_user(pool: &SqlitePool, id: i64) -> Result<User, AppError> {
    users::find_by_id(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

async fn load_profile(pool: &SqlitePool, id: i64) -> Result<ProfileResponse, AppError> {
    let user = find_user(pool, id).await?;
    let own = posts::list_by_owner(pool, id).await?;

    Ok(ProfileResponse {
        user: UserResponse::from(user),
        posts: posts::hydrate(pool, own).await?,
    })
}
