use std::collections::HashMap;

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::{
    db::posts,
    error::AppError,
    models::comment::{Comment, CommentWithAuthor},
};

const WITH_AUTHOR: &str = "SELECT c.id, c.post_id, c.user_id, u.username, u.profile_picture, \
     c.content, c.created_at \
     FROM comments c JOIN users u ON c.user_id = u.id";

pub async fn insert(
    pool: &SqlitePool,
    post_id: i64,
    user_id: i64,
    content: &str,
) -> Result<Comment, sqlx::Error> {
    sqlx::query_as::<_, Comment>(
        "INSERT INTO comments (post_id, user_id, content, created_at) VALUES (?, ?, ?, ?) \
         RETURNING id, post_id, user_id, content, created_at",
    )
    .bind(post_id)
    .bind(user_id)
    .bind(content)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
}

pub async fn find(pool: &SqlitePool, id: i64) -> Result<Option<Comment>, sqlx::Error> {
    sqlx::query_as::<_, Comment>(
        "SELECT id, post_id, user_id, content, created_at FROM comments WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn find_with_author(
    pool: &SqlitePool,
    id: i64,
) -> Result<Option<CommentWithAuthor>, sqlx::Error> {
    sqlx::query_as::<_, CommentWithAuthor>(&format!("{WITH_AUTHOR} WHERE c.id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Comments of a post, newest first.
pub async fn list_for_post(
    pool: &SqlitePool,
    post_id: i64,
) -> Result<Vec<CommentWithAuthor>, sqlx::Error> {
    sqlx::query_as::<_, CommentWithAuthor>(&format!(
        "{WITH_AUTHOR} WHERE c.post_id = ? ORDER BY c.created_at DESC, c.id DESC"
    ))
    .bind(post_id)
    .fetch_all(pool)
    .await
}

/// Resolves comment ids to records, keeping the order of `ids`. Unknown ids are skipped.
pub async fn find_many_with_author(
    pool: &SqlitePool,
    ids: &[i64],
) -> Result<Vec<CommentWithAuthor>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(WITH_AUTHOR);
    builder.push(" WHERE c.id IN (");
    {
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
    }
    builder.push(")");

    let rows: Vec<CommentWithAuthor> = builder.build_query_as().fetch_all(pool).await?;
    let mut by_id: HashMap<i64, CommentWithAuthor> =
        rows.into_iter().map(|row| (row.id, row)).collect();

    Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
}

pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM comments WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Creates a comment and appends it to its post's comment list.
///
/// The comment insert is the primary write. If appending the reference fails,
/// the comment is deleted again so no unreferenced comment is left behind.
/// Only when that compensation fails too does the caller get `PartialFailure`.
pub async fn create_linked(
    pool: &SqlitePool,
    post_id: i64,
    user_id: i64,
    content: &str,
) -> Result<Comment, AppError> {
    let comment = insert(pool, post_id, user_id, content).await?;

    let Err(link_err) = posts::push_comment_ref(pool, post_id, comment.id).await else {
        return Ok(comment);
    };

    tracing::error!(
        "Failed to link comment {} to post {}: {}",
        comment.id,
        post_id,
        link_err
    );

    match delete(pool, comment.id).await {
        Ok(_) => Err(AppError::InternalServerError(format!(
            "Comment {} rolled back after link failure: {}",
            comment.id, link_err
        ))),
        Err(undo_err) => {
            tracing::error!("Failed to roll back comment {}: {}", comment.id, undo_err);
            Err(AppError::PartialFailure(
                "Comment was saved but could not be attached to the post".to_string(),
            ))
        }
    }
}

/// Deletes a comment and removes it from its post's comment list.
///
/// A failure to remove the reference after the comment is gone is reported as
/// `PartialFailure`; the dangling reference is cleared by the reconciliation sweep.
pub async fn delete_linked(pool: &SqlitePool, comment: &Comment) -> Result<(), AppError> {
    if !delete(pool, comment.id).await? {
        return Err(AppError::NotFound("Comment not found".to_string()));
    }

    if let Err(e) = posts::pull_comment_ref(pool, comment.post_id, comment.id).await {
        tracing::error!(
            "Comment {} deleted but its reference on post {} remains: {}",
            comment.id,
            comment.post_id,
            e
        );
        return Err(AppError::PartialFailure(
            "Comment was deleted but the post still references it".to_string(),
        ));
    }

    Ok(())
}
