// tests/common/mod.rs

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use petlovers::{
    blob::{BlobStore, FsBlobStore},
    config::Config,
    db, routes,
    state::AppState,
};
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use tempfile::TempDir;

pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake-image-body";

pub struct TestApp {
    pub address: String,
    pub pool: SqlitePool,
    pub client: reqwest::Client,
    pub upload_dir: TempDir,
}

/// Spawns the app on a random port with an in-memory database and a
/// filesystem blob store in a temporary directory.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(|dir, public_url| -> Arc<dyn BlobStore> {
        Arc::new(FsBlobStore::new(dir, public_url).unwrap())
    })
    .await
}

/// Like `spawn_app`, but lets the test pick the blob store.
pub async fn spawn_app_with<F>(make_blobs: F) -> TestApp
where
    F: FnOnce(PathBuf, &str) -> Arc<dyn BlobStore>,
{
    // A single connection keeps every query on the same in-memory database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(db::connect_options("sqlite::memory:").unwrap())
        .await
        .expect("Failed to open in-memory database");

    db::migrate(&pool).await.expect("Failed to migrate database");

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let upload_dir = tempfile::tempdir().expect("Failed to create upload dir");
    let public_upload_url = format!("{}/uploads/", address);

    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        upload_dir: upload_dir.path().to_path_buf(),
        public_upload_url: public_upload_url.clone(),
        max_images_per_post: 5,
        max_upload_bytes: 10 * 1024 * 1024,
        cors_origins: vec!["http://localhost:5173".to_string()],
        reconcile_on_startup: false,
    };

    let blobs = make_blobs(upload_dir.path().to_path_buf(), &public_upload_url);

    let state = AppState {
        pool: pool.clone(),
        config,
        blobs,
    };
    let app = routes::create_router(state);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address,
        pool,
        client: reqwest::Client::new(),
        upload_dir,
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.address, path)
    }

    /// Registers `username` and returns `(token, user_id)`.
    pub async fn register(&self, username: &str) -> (String, i64) {
        let response = self
            .client
            .post(self.url("/auth/register"))
            .json(&serde_json::json!({
                "username": username,
                "email": format!("{}@example.com", username),
                "password": "password123"
            }))
            .send()
            .await
            .expect("Register failed");
        assert_eq!(response.status().as_u16(), 201);

        let body: Value = response.json().await.unwrap();
        (
            body["token"].as_str().unwrap().to_string(),
            body["user"]["id"].as_i64().unwrap(),
        )
    }

    pub fn post_form(title: &str, content: &str, species: &str, breed: &str, images: usize) -> Form {
        let mut form = Form::new()
            .text("title", title.to_string())
            .text("content", content.to_string())
            .text("species", species.to_string())
            .text("breed", breed.to_string());

        for i in 0..images {
            let part = Part::bytes(PNG_BYTES.to_vec())
                .file_name(format!("img{}.png", i + 1))
                .mime_str("image/png")
                .unwrap();
            form = form.part("images", part);
        }

        form
    }

    /// Creates a post and returns its JSON.
    pub async fn create_post(
        &self,
        token: &str,
        title: &str,
        content: &str,
        species: &str,
        breed: &str,
        images: usize,
    ) -> Value {
        let response = self
            .client
            .post(self.url("/pets"))
            .bearer_auth(token)
            .multipart(Self::post_form(title, content, species, breed, images))
            .send()
            .await
            .expect("Create post failed");
        assert_eq!(response.status().as_u16(), 201);

        response.json().await.unwrap()
    }

    pub async fn get_json(&self, path: &str) -> (u16, Value) {
        let response = self.client.get(self.url(path)).send().await.unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap_or(Value::Null))
    }

    /// Path on disk of a blob URL served by this app.
    pub fn blob_path(&self, url: &str) -> PathBuf {
        let prefix = format!("{}/uploads/", self.address);
        let key = url.strip_prefix(&prefix).expect("URL is not served by this app");
        self.upload_dir.path().join(key)
    }
}
