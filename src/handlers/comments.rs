use axum::{extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    db::{comments, posts},
    error::AppError,
    extractors::{AuthUser, Json, Path},
    models::comment::{CommentResponse, CreateCommentRequest},
    utils::text::plain_text,
};

/// Comment on an existing post.
pub async fn create_comment(
    State(pool): State<SqlitePool>,
    user: AuthUser,
    Path(post_id): Path<i64>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let payload = CreateCommentRequest {
        content: plain_text(&payload.content),
    };
    payload.validate()?;

    posts::find(&pool, post_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

    let comment = comments::create_linked(&pool, post_id, user.id, &payload.content).await?;

    let created = comments::find_with_author(&pool, comment.id)
        .await?
        .ok_or_else(|| AppError::InternalServerError(format!("Comment {} vanished", comment.id)))?;

    Ok((StatusCode::CREATED, Json(CommentResponse::from(created))))
}

/// List all comments for a post, newest first.
pub async fn list_comments(
    State(pool): State<SqlitePool>,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let comments: Vec<CommentResponse> = comments::list_for_post(&pool, post_id)
        .await?
        .into_iter()
        .map(CommentResponse::from)
        .collect();

    Ok(Json(comments))
}

/// Delete a comment and unlink it from its post.
/// Requires: Login + Author.
pub async fn delete_comment(
    State(pool): State<SqlitePool>,
    user: AuthUser,
    Path(comment_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let comment = comments::find(&pool, comment_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

    user.ensure_owns(comment.user_id, "delete this comment")?;

    comments::delete_linked(&pool, &comment).await?;

    Ok(Json(json!({ "message": "Comment deleted successfully" })))
}
