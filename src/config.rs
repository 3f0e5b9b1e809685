// src/config.rs

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use dotenvy::dotenv;

/// Default credential lifetime: 30 days.
pub const DEFAULT_JWT_EXPIRATION: u64 = 60 * 60 * 24 * 30;

/// Blob folder for pet post images.
pub const POST_IMAGE_FOLDER: &str = "pets";

/// Blob folder for profile pictures.
pub const PROFILE_PICTURE_FOLDER: &str = "profile-pictures";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Credential lifetime in seconds.
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub bind_addr: String,
    /// Root directory of the filesystem blob store.
    pub upload_dir: PathBuf,
    /// Public URL prefix under which stored blobs are reachable.
    pub public_upload_url: String,
    pub max_images_per_post: usize,
    pub max_upload_bytes: usize,
    pub cors_origins: Vec<String>,
    pub reconcile_on_startup: bool,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173,http://localhost:3000".to_string())
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        Self {
            database_url,
            jwt_secret,
            jwt_expiration: parse_or("JWT_EXPIRATION", DEFAULT_JWT_EXPIRATION),
            rust_log,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:5000".to_string()),
            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("uploads")),
            public_upload_url: env::var("PUBLIC_UPLOAD_URL")
                .unwrap_or_else(|_| "http://localhost:5000/uploads/".to_string()),
            max_images_per_post: parse_or("MAX_IMAGES_PER_POST", 5),
            max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", 10 * 1024 * 1024),
            cors_origins,
            reconcile_on_startup: parse_or("RECONCILE_ON_STARTUP", true),
        }
    }
}

/// Reads an optional variable, falling back to `default` when it is unset or unparsable.
fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid value for {}: {:?}", key, raw);
            default
        }),
        Err(_) => default,
    }
}
