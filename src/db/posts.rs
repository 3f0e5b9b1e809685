use std::collections::HashMap;

use chrono::Utc;
use sqlx::{Decode, QueryBuilder, Row, Sqlite, SqlitePool, Type, sqlite::SqliteRow};

use crate::{
    db::{comments, users},
    error::AppError,
    models::{
        comment::CommentResponse,
        post::{
            CreatePostFields, Post, PostDetailResponse, PostQuery, PostResponse, PostSort,
            UpdatePostRequest,
        },
        user::{PublicProfile, UserSummary},
    },
};

const POST_COLUMNS: &str =
    "p.id, p.user_id, p.title, p.content, p.species, p.breed, p.created_at, p.updated_at";

/// Inserts a post together with its image references.
pub async fn insert(
    pool: &SqlitePool,
    owner_id: i64,
    fields: &CreatePostFields,
    image_urls: &[String],
) -> Result<i64, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let (post_id,): (i64,) = sqlx::query_as(
        "INSERT INTO posts \
         (user_id, title, content, species, breed, title_folded, content_folded, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(owner_id)
    .bind(&fields.title)
    .bind(&fields.content)
    .bind(&fields.species)
    .bind(&fields.breed)
    .bind(fold_case(&fields.title))
    .bind(fold_case(&fields.content))
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await?;

    for url in image_urls {
        sqlx::query("INSERT INTO post_images (post_id, url) VALUES (?, ?)")
            .bind(post_id)
            .bind(url)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    Ok(post_id)
}

pub async fn find(pool: &SqlitePool, id: i64) -> Result<Option<Post>, sqlx::Error> {
    sqlx::query_as::<_, Post>(&format!("SELECT {POST_COLUMNS} FROM posts p WHERE p.id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Lists posts matching every present filter of `query`.
pub async fn list(pool: &SqlitePool, query: &PostQuery) -> Result<Vec<Post>, sqlx::Error> {
    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {POST_COLUMNS} FROM posts p WHERE 1 = 1"));

    if let Some(search) = &query.search {
        // SQLite only folds ASCII, so match the folded columns instead.
        let pattern = format!("%{}%", escape_like(&fold_case(search)));
        builder.push(" AND (p.title_folded LIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" ESCAPE '\\' OR p.content_folded LIKE ");
        builder.push_bind(pattern);
        builder.push(" ESCAPE '\\')");
    }

    if let Some(species) = &query.species {
        builder.push(" AND p.species = ");
        builder.push_bind(species.clone());
    }

    if let Some(breed) = &query.breed {
        builder.push(" AND p.breed = ");
        builder.push_bind(breed.clone());
    }

    builder.push(match query.sort {
        PostSort::Newest => " ORDER BY p.created_at DESC, p.id DESC",
        PostSort::Oldest => " ORDER BY p.created_at ASC, p.id ASC",
        PostSort::Popular => {
            " ORDER BY (SELECT COUNT(*) FROM post_likes l WHERE l.post_id = p.id) DESC, \
             p.created_at DESC, p.id DESC"
        }
    });

    builder.build_query_as::<Post>().fetch_all(pool).await
}

/// Posts of one owner, newest first.
pub async fn list_by_owner(pool: &SqlitePool, owner_id: i64) -> Result<Vec<Post>, sqlx::Error> {
    sqlx::query_as::<_, Post>(&format!(
        "SELECT {POST_COLUMNS} FROM posts p WHERE p.user_id = ? \
         ORDER BY p.created_at DESC, p.id DESC"
    ))
    .bind(owner_id)
    .fetch_all(pool)
    .await
}

/// Applies the present fields of an edit. Owner and references are never touched here.
pub async fn update_fields(
    pool: &SqlitePool,
    id: i64,
    changes: &UpdatePostRequest,
) -> Result<(), sqlx::Error> {
    if changes.is_empty() {
        return Ok(());
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE posts SET ");
    let mut separated = builder.separated(", ");

    if let Some(title) = &changes.title {
        separated.push("title = ");
        separated.push_bind_unseparated(title.clone());
        separated.push("title_folded = ");
        separated.push_bind_unseparated(fold_case(title));
    }

    if let Some(content) = &changes.content {
        separated.push("content = ");
        separated.push_bind_unseparated(content.clone());
        separated.push("content_folded = ");
        separated.push_bind_unseparated(fold_case(content));
    }

    if let Some(species) = &changes.species {
        separated.push("species = ");
        separated.push_bind_unseparated(species.clone());
    }

    if let Some(breed) = &changes.breed {
        separated.push("breed = ");
        separated.push_bind_unseparated(breed.clone());
    }

    separated.push("updated_at = ");
    separated.push_bind_unseparated(Utc::now());

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    builder.build().execute(pool).await?;

    Ok(())
}

/// Removes the post record. Images, likes, comments and comment references
/// go with it through the schema's cascades; blobs are the caller's concern.
pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM posts WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn image_urls(pool: &SqlitePool, post_id: i64) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT url FROM post_images WHERE post_id = ? ORDER BY id")
        .bind(post_id)
        .fetch_all(pool)
        .await
}

/// Removes one occurrence of `url` from the post's image list.
pub async fn remove_image(pool: &SqlitePool, post_id: i64, url: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM post_images WHERE id = \
         (SELECT id FROM post_images WHERE post_id = ? AND url = ? ORDER BY id LIMIT 1)",
    )
    .bind(post_id)
    .bind(url)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Like set of a post, in the order the likes were given.
pub async fn likes(pool: &SqlitePool, post_id: i64) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT user_id FROM post_likes WHERE post_id = ? ORDER BY created_at, rowid",
    )
    .bind(post_id)
    .fetch_all(pool)
    .await
}

/// Adds `user_id` to the like set. Returns `false` if it was already there.
///
/// The `(post_id, user_id)` primary key makes this a single atomic write, so
/// concurrent likes by the same user cannot duplicate the entry.
pub async fn add_like(pool: &SqlitePool, post_id: i64, user_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO post_likes (post_id, user_id, created_at) VALUES (?, ?, ?) \
         ON CONFLICT(post_id, user_id) DO NOTHING",
    )
    .bind(post_id)
    .bind(user_id)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Removes `user_id` from the like set. Returns `false` if it was not there.
pub async fn remove_like(pool: &SqlitePool, post_id: i64, user_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM post_likes WHERE post_id = ? AND user_id = ?")
        .bind(post_id)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() == 1)
}

/// Comment reference list of a post, in insertion order.
pub async fn comment_refs(pool: &SqlitePool, post_id: i64) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar("SELECT comment_id FROM post_comments WHERE post_id = ? ORDER BY id")
        .bind(post_id)
        .fetch_all(pool)
        .await
}

pub async fn push_comment_ref(
    pool: &SqlitePool,
    post_id: i64,
    comment_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO post_comments (post_id, comment_id) VALUES (?, ?) \
         ON CONFLICT(post_id, comment_id) DO NOTHING",
    )
    .bind(post_id)
    .bind(comment_id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn pull_comment_ref(
    pool: &SqlitePool,
    post_id: i64,
    comment_id: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM post_comments WHERE post_id = ? AND comment_id = ?")
        .bind(post_id)
        .bind(comment_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Attaches owners and the image, like and comment references to a page of posts.
/// Each child collection is loaded with one query for the whole page.
pub async fn hydrate(pool: &SqlitePool, posts: Vec<Post>) -> Result<Vec<PostResponse>, AppError> {
    if posts.is_empty() {
        return Ok(Vec::new());
    }

    let post_ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
    let mut owner_ids: Vec<i64> = posts.iter().map(|p| p.user_id).collect();
    owner_ids.sort_unstable();
    owner_ids.dedup();

    let owners = owner_summaries(pool, &owner_ids).await?;
    let mut images: HashMap<i64, Vec<String>> = fetch_grouped(
        pool,
        "SELECT post_id, url FROM post_images",
        &post_ids,
        "post_id, id",
    )
    .await?;
    let mut likes: HashMap<i64, Vec<i64>> = fetch_grouped(
        pool,
        "SELECT post_id, user_id FROM post_likes",
        &post_ids,
        "post_id, created_at, rowid",
    )
    .await?;
    let mut comments: HashMap<i64, Vec<i64>> = fetch_grouped(
        pool,
        "SELECT post_id, comment_id FROM post_comments",
        &post_ids,
        "post_id, id",
    )
    .await?;

    posts
        .into_iter()
        .map(|post| {
            let user = owners.get(&post.user_id).cloned().ok_or_else(|| {
                AppError::InternalServerError(format!(
                    "Owner {} of post {} is missing",
                    post.user_id, post.id
                ))
            })?;

            Ok(PostResponse {
                id: post.id,
                title: post.title,
                content: post.content,
                species: post.species,
                breed: post.breed,
                image_urls: images.remove(&post.id).unwrap_or_default(),
                user,
                likes: likes.remove(&post.id).unwrap_or_default(),
                comments: comments.remove(&post.id).unwrap_or_default(),
                created_at: post.created_at,
                updated_at: post.updated_at,
            })
        })
        .collect()
}

pub async fn hydrate_one(pool: &SqlitePool, post: Post) -> Result<PostResponse, AppError> {
    hydrate(pool, vec![post])
        .await?
        .pop()
        .ok_or_else(|| AppError::InternalServerError("Post vanished while loading".to_string()))
}

/// Detail view: owner resolved to a public profile, comment references
/// resolved to comment records in list order. References whose comment no
/// longer exists are skipped.
pub async fn detail(pool: &SqlitePool, post: Post) -> Result<PostDetailResponse, AppError> {
    let owner = users::find_by_id(pool, post.user_id)
        .await?
        .ok_or_else(|| {
            AppError::InternalServerError(format!(
                "Owner {} of post {} is missing",
                post.user_id, post.id
            ))
        })?;

    let refs = comment_refs(pool, post.id).await?;
    let comments: Vec<CommentResponse> = comments::find_many_with_author(pool, &refs)
        .await?
        .into_iter()
        .map(CommentResponse::from)
        .collect();

    Ok(PostDetailResponse {
        id: post.id,
        title: post.title,
        content: post.content,
        species: post.species,
        breed: post.breed,
        image_urls: image_urls(pool, post.id).await?,
        user: PublicProfile::from(owner),
        likes: likes(pool, post.id).await?,
        comments,
        created_at: post.created_at,
        updated_at: post.updated_at,
    })
}

async fn owner_summaries(
    pool: &SqlitePool,
    ids: &[i64],
) -> Result<HashMap<i64, UserSummary>, sqlx::Error> {
    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT id, username, profile_picture FROM users WHERE id IN (");
    {
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
    }
    builder.push(")");

    let rows: Vec<UserSummary> = builder.build_query_as().fetch_all(pool).await?;

    Ok(rows.into_iter().map(|user| (user.id, user)).collect())
}

/// Runs `select` restricted to `post_ids` and groups the second column by post.
async fn fetch_grouped<T>(
    pool: &SqlitePool,
    select: &str,
    post_ids: &[i64],
    order_by: &str,
) -> Result<HashMap<i64, Vec<T>>, sqlx::Error>
where
    T: for<'r> Decode<'r, Sqlite> + Type<Sqlite>,
{
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(select);
    builder.push(" WHERE post_id IN (");
    {
        let mut separated = builder.separated(", ");
        for id in post_ids {
            separated.push_bind(*id);
        }
    }
    builder.push(") ORDER BY ");
    builder.push(order_by);

    let rows: Vec<SqliteRow> = builder.build().fetch_all(pool).await?;

    let mut grouped: HashMap<i64, Vec<T>> = HashMap::new();
    for row in rows {
        let post_id: i64 = row.try_get(0)?;
        grouped.entry(post_id).or_default().push(row.try_get(1)?);
    }

    Ok(grouped)
}

/// Unicode lower-casing shared by the stored search columns and the search text.
fn fold_case(text: &str) -> String {
    text.to_lowercase()
}

/// Escapes LIKE wildcards so user input only ever matches literally.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
