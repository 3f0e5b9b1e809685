use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::{
    error::{AppError, map_unique_violation},
    models::user::{UpdateProfileFields, User},
};

const USER_COLUMNS: &str = "id, username, email, password, bio, profile_picture, created_at";

pub async fn insert(
    pool: &SqlitePool,
    username: &str,
    email: &str,
    password_hash: &str,
) -> Result<User, AppError> {
    sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (username, email, password, created_at) \
         VALUES (?, ?, ?, ?) RETURNING {USER_COLUMNS}"
    ))
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
    .map_err(|e| map_unique_violation(e, "User already exists"))
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
        .bind(email)
        .fetch_optional(pool)
        .await
}

/// Applies the present fields of a profile edit; absent fields are untouched.
pub async fn update_fields(
    pool: &SqlitePool,
    id: i64,
    fields: &UpdateProfileFields,
) -> Result<(), AppError> {
    if fields.is_empty() {
        return Ok(());
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE users SET ");
    let mut separated = builder.separated(", ");

    if let Some(username) = &fields.username {
        separated.push("username = ");
        separated.push_bind_unseparated(username.clone());
    }

    if let Some(email) = &fields.email {
        separated.push("email = ");
        separated.push_bind_unseparated(email.clone());
    }

    if let Some(bio) = &fields.bio {
        separated.push("bio = ");
        separated.push_bind_unseparated(bio.clone());
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    builder
        .build()
        .execute(pool)
        .await
        .map_err(|e| map_unique_violation(e, "Username or email is already taken"))?;

    Ok(())
}

pub async fn set_profile_picture(
    pool: &SqlitePool,
    id: i64,
    url: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET profile_picture = ? WHERE id = ?")
        .bind(url)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}
