use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::{
    comment::CommentResponse,
    user::{PublicProfile, UserSummary},
};

/// Represents the 'posts' table in the database.
#[derive(Debug, Clone, FromRow)]
pub struct Post {
    pub id: i64,
    /// Owner. Set from the authenticated identity at creation, never updated.
    pub user_id: i64,
    pub title: String,
    pub content: String,
    pub species: String,
    pub breed: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A post with its image, like and comment references.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub species: String,
    pub breed: String,
    pub image_urls: Vec<String>,
    pub user: UserSummary,
    /// Ids of the users who liked the post.
    pub likes: Vec<i64>,
    /// Ids of the post's comments, in insertion order.
    pub comments: Vec<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Post detail with owner and comments resolved.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDetailResponse {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub species: String,
    pub breed: String,
    pub image_urls: Vec<String>,
    pub user: PublicProfile,
    pub likes: Vec<i64>,
    pub comments: Vec<CommentResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Text fields of the multipart create form.
#[derive(Debug, Validate)]
pub struct CreatePostFields {
    #[validate(length(
        min = 1,
        max = 100,
        message = "Title length must be between 1 and 100 chars"
    ))]
    pub title: String,

    #[validate(length(
        min = 1,
        max = 10000,
        message = "Content length must be between 1 and 10000 chars"
    ))]
    pub content: String,

    #[validate(length(min = 1, max = 50, message = "Species is required"))]
    pub species: String,

    #[validate(length(min = 1, max = 50, message = "Breed is required"))]
    pub breed: String,
}

/// DTO for editing a post. Absent fields stay unchanged.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdatePostRequest {
    #[validate(length(
        min = 1,
        max = 100,
        message = "Title length must be between 1 and 100 chars"
    ))]
    pub title: Option<String>,

    #[validate(length(
        min = 1,
        max = 10000,
        message = "Content length must be between 1 and 10000 chars"
    ))]
    pub content: Option<String>,

    #[validate(length(min = 1, max = 50, message = "Species must not be empty"))]
    pub species: Option<String>,

    #[validate(length(min = 1, max = 50, message = "Breed must not be empty"))]
    pub breed: Option<String>,
}

impl UpdatePostRequest {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none() && self.species.is_none() && self.breed.is_none()
    }
}

/// Listing order for posts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostSort {
    #[default]
    Newest,
    Oldest,
    /// Most liked first, ties by recency.
    Popular,
}

/// Typed filter for post listings. Every field is optional; present fields are ANDed.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PostQuery {
    /// Case-insensitive substring matched against title OR content.
    #[validate(length(min = 1, max = 100, message = "Search text must be 1 to 100 chars"))]
    pub search: Option<String>,

    /// Exact species match.
    #[validate(length(min = 1, max = 50, message = "Species must be 1 to 50 chars"))]
    pub species: Option<String>,

    /// Exact breed match.
    #[validate(length(min = 1, max = 50, message = "Breed must be 1 to 50 chars"))]
    pub breed: Option<String>,

    #[serde(default)]
    pub sort: PostSort,
}

impl PostQuery {
    /// Drops blank parameters (`?species=`) so they do not filter anything.
    pub fn normalized(self) -> Self {
        use crate::utils::text::non_blank;

        Self {
            search: non_blank(self.search),
            species: non_blank(self.species),
            breed: non_blank(self.breed),
            sort: self.sort,
        }
    }
}

/// Query string of `GET /pets/search`.
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
}

/// Query string of `GET /pets/filter`.
#[derive(Debug, Deserialize)]
pub struct FilterParams {
    pub species: Option<String>,
    pub breed: Option<String>,
}

/// Matching posts with their count.
#[derive(Debug, Serialize)]
pub struct PostListResponse {
    pub count: usize,
    pub posts: Vec<PostResponse>,
}

impl From<Vec<PostResponse>> for PostListResponse {
    fn from(posts: Vec<PostResponse>) -> Self {
        Self {
            count: posts.len(),
            posts,
        }
    }
}

/// DTO naming the image to remove from a post.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DeleteImageRequest {
    #[validate(length(min = 1, message = "imageUrl is required"))]
    pub image_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagesResponse {
    pub image_urls: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct LikesResponse {
    pub likes: Vec<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletePostResponse {
    pub message: String,
    /// Images whose blob could not be deleted; queued for the reconciliation sweep.
    pub failed_images: Vec<String>,
}
