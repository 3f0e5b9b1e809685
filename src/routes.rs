// src/routes.rs

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    routing::{delete, get, post, put},
};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::{
    error::AppError,
    handlers::{auth, comments, pets, users},
    state::AppState,
};

/// Assembles the main application router.
///
/// * Public routes: auth, post listing/detail, comment listing, public profiles.
/// * Protected routes take an `AuthUser` argument and reject unauthenticated calls.
/// * Stored blobs are served from the upload directory under `/uploads`.
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    // Static segments (/search, /filter) take precedence over /{id}.
    let pet_routes = Router::new()
        .route("/", get(pets::list_posts).post(pets::create_post))
        .route("/search", get(pets::search_posts))
        .route("/filter", get(pets::filter_posts))
        .route(
            "/{id}",
            get(pets::get_post)
                .put(pets::update_post)
                .delete(pets::delete_post),
        )
        .route("/{id}/like", put(pets::like_post))
        .route("/{id}/unlike", put(pets::unlike_post))
        .route("/{id}/images", delete(pets::delete_image));

    // GET/POST take a post id, DELETE takes a comment id.
    let comment_routes = Router::new().route(
        "/{id}",
        get(comments::list_comments)
            .post(comments::create_comment)
            .delete(comments::delete_comment),
    );

    let user_routes = Router::new()
        .route(
            "/profile",
            get(users::get_profile).put(users::update_profile),
        )
        .route("/posts", get(users::list_own_posts))
        .route("/profile-picture", delete(users::delete_profile_picture))
        .route("/{id}", get(users::get_user));

    let uploads = ServeDir::new(&state.config.upload_dir);
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/api/test", get(|| async { Json(json!({ "message": "API is working!" })) }))
        .nest("/api/auth", auth_routes)
        .nest("/api/pets", pet_routes)
        .nest("/api/comments", comment_routes)
        .nest("/api/users", user_routes)
        .nest_service("/uploads", uploads)
        .fallback(|| async { AppError::NotFound("Route not found".to_string()) })
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}
