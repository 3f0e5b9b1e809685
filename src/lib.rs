// src/lib.rs

pub mod blob;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod models;
pub mod reconcile;
pub mod routes;
pub mod state;
pub mod upload;
pub mod utils;

pub use routes::create_router;
