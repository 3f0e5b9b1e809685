// src/handlers/pets.rs

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    blob::{BlobStore, discard_blob},
    config::{Config, POST_IMAGE_FOLDER},
    db::posts,
    error::AppError,
    extractors::{AuthUser, Json, Multipart, Path, Query},
    models::post::{
        CreatePostFields, DeleteImageRequest, DeletePostResponse, FilterParams, ImagesResponse,
        LikesResponse, Post, PostListResponse, PostQuery, SearchParams, UpdatePostRequest,
    },
    upload::MultipartForm,
    utils::text::plain_text,
};

/// List posts, newest first by default.
/// Accepts optional `search`, `species`, `breed` and `sort` query parameters.
pub async fn list_posts(
    State(pool): State<SqlitePool>,
    Query(query): Query<PostQuery>,
) -> Result<impl IntoResponse, AppError> {
    let query = query.normalized();
    query.validate()?;

    let posts = posts::list(&pool, &query).await?;

    Ok(Json(posts::hydrate(&pool, posts).await?))
}

/// Case-insensitive substring search over title and content.
pub async fn search_posts(
    State(pool): State<SqlitePool>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, AppError> {
    let query = PostQuery {
        search: params.query,
        ..PostQuery::default()
    }
    .normalized();

    if query.search.is_none() {
        return Err(AppError::BadRequest("Search query is required".to_string()));
    }
    query.validate()?;

    let posts = posts::list(&pool, &query).await?;
    let posts = posts::hydrate(&pool, posts).await?;

    Ok(Json(PostListResponse::from(posts)))
}

/// Exact match on species and/or breed. Without either, every post matches.
pub async fn filter_posts(
    State(pool): State<SqlitePool>,
    Query(params): Query<FilterParams>,
) -> Result<impl IntoResponse, AppError> {
    let query = PostQuery {
        species: params.species,
        breed: params.breed,
        ..PostQuery::default()
    }
    .normalized();
    query.validate()?;

    let posts = posts::list(&pool, &query).await?;
    let posts = posts::hydrate(&pool, posts).await?;

    Ok(Json(PostListResponse::from(posts)))
}

/// Get a single post with its owner and comments resolved.
pub async fn get_post(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let post = find_post(&pool, id).await?;

    Ok(Json(posts::detail(&pool, post).await?))
}

/// Create a post from a multipart form (`title`, `content`, `species`,
/// `breed`, `images`). The owner is always the caller.
pub async fn create_post(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    State(blobs): State<Arc<dyn BlobStore>>,
    user: AuthUser,
    Multipart(multipart): Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut form =
        MultipartForm::parse(multipart, &["images", "images[]"], config.max_images_per_post)
            .await?;

    let mut sanitized = |name: &str| form.text(name).map(|v| plain_text(&v)).unwrap_or_default();
    let fields = CreatePostFields {
        title: sanitized("title"),
        content: sanitized("content"),
        species: sanitized("species"),
        breed: sanitized("breed"),
    };
    fields.validate()?;

    let mut stored = Vec::new();
    for image in form.take_images() {
        match blobs.put(POST_IMAGE_FOLDER, image.extension, image.bytes).await {
            Ok(blob) => stored.push(blob.url),
            Err(e) => {
                discard_all(&pool, blobs.as_ref(), &stored).await;
                return Err(e.into());
            }
        }
    }

    let post_id = match posts::insert(&pool, user.id, &fields, &stored).await {
        Ok(id) => id,
        Err(e) => {
            tracing::error!("Failed to create post: {:?}", e);
            discard_all(&pool, blobs.as_ref(), &stored).await;
            return Err(e.into());
        }
    };

    tracing::info!(
        "User {} created post {} with {} images",
        user.id,
        post_id,
        stored.len()
    );

    let post = find_post(&pool, post_id).await?;

    Ok((StatusCode::CREATED, Json(posts::hydrate_one(&pool, post).await?)))
}

/// Edit title, content, species or breed.
/// Requires: Login + Owner.
pub async fn update_post(
    State(pool): State<SqlitePool>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<impl IntoResponse, AppError> {
    let post = find_post(&pool, id).await?;
    user.ensure_owns(post.user_id, "edit this post")?;

    let clean = |value: Option<String>| value.map(|v| plain_text(&v));
    let changes = UpdatePostRequest {
        title: clean(payload.title),
        content: clean(payload.content),
        species: clean(payload.species),
        breed: clean(payload.breed),
    };
    changes.validate()?;

    posts::update_fields(&pool, id, &changes).await?;

    let post = find_post(&pool, id).await?;

    Ok(Json(posts::hydrate_one(&pool, post).await?))
}

/// Delete a post and its images.
/// Requires: Login + Owner.
///
/// The record goes first; image deletions that fail afterwards are reported in
/// `failedImages` and queued, but do not fail the request.
pub async fn delete_post(
    State(pool): State<SqlitePool>,
    State(blobs): State<Arc<dyn BlobStore>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let post = find_post(&pool, id).await?;
    user.ensure_owns(post.user_id, "delete this post")?;

    let image_urls = posts::image_urls(&pool, id).await?;

    if !posts::delete(&pool, id).await? {
        return Err(AppError::NotFound("Post not found".to_string()));
    }

    let failed_images = discard_all(&pool, blobs.as_ref(), &image_urls).await;

    tracing::info!(
        "User {} deleted post {} ({} of {} images could not be removed)",
        user.id,
        id,
        failed_images.len(),
        image_urls.len()
    );

    Ok(Json(DeletePostResponse {
        message: "Post deleted successfully".to_string(),
        failed_images,
    }))
}

/// Remove one image from a post.
/// Requires: Login + Owner. Returns the remaining image list.
pub async fn delete_image(
    State(pool): State<SqlitePool>,
    State(blobs): State<Arc<dyn BlobStore>>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<DeleteImageRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let post = find_post(&pool, id).await?;
    user.ensure_owns(post.user_id, "modify this post")?;

    if !posts::remove_image(&pool, id, &payload.image_url).await? {
        return Err(AppError::NotFound("Image not found on this post".to_string()));
    }

    discard_blob(&pool, blobs.as_ref(), &payload.image_url).await;

    Ok(Json(ImagesResponse {
        image_urls: posts::image_urls(&pool, id).await?,
    }))
}

/// Like a post. Any authenticated user may like, once.
pub async fn like_post(
    State(pool): State<SqlitePool>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    find_post(&pool, id).await?;

    if !posts::add_like(&pool, id, user.id).await? {
        return Err(AppError::Conflict("Post already liked".to_string()));
    }

    Ok(Json(LikesResponse {
        likes: posts::likes(&pool, id).await?,
    }))
}

/// Remove the caller's like.
pub async fn unlike_post(
    State(pool): State<SqlitePool>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    find_post(&pool, id).await?;

    if !posts::remove_like(&pool, id, user.id).await? {
        return Err(AppError::Conflict("Post has not yet been liked".to_string()));
    }

    Ok(Json(LikesResponse {
        likes: posts::likes(&pool, id).await?,
    }))
}

async fn find_post(pool: &SqlitePool, id: i64) -> Result<Post, AppError> {
    posts::find(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))
}

/// Deletes every blob in `urls`, returning the ones that could not be deleted.
async fn discard_all(pool: &SqlitePool, blobs: &dyn BlobStore, urls: &[String]) -> Vec<String> {
    let mut failed = Vec::new();
    for url in urls {
        if !discard_blob(pool, blobs, url).await {
            failed.push(url.clone());
        }
    }
    failed
}
