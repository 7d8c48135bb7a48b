pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod reconcile;
pub mod routes;
pub mod sessions;
pub mod share;
pub mod store;
pub mod vote;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::config::Config;
use crate::sessions::FeedRegistry;
use crate::store::SqliteStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SqliteStore>,
    pub feeds: FeedRegistry,
    pub jwt_secret: String,
    pub share_base_url: String,
}

impl AppState {
    pub fn new(store: Arc<SqliteStore>, config: &Config) -> Self {
        Self {
            store,
            feeds: FeedRegistry::default(),
            jwt_secret: config.jwt_secret.clone(),
            share_base_url: config.share_base_url.clone(),
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(|| async { "ok" }))
        // Feed sessions
        .route("/api/feeds", post(routes::feeds::open_feed))
        .route(
            "/api/feeds/{id}",
            get(routes::feeds::get_feed).delete(routes::feeds::close_feed),
        )
        .route("/api/feeds/{id}/events", get(routes::feeds::feed_events))
        .route("/api/feeds/{id}/more", post(routes::feeds::load_more))
        // Posts
        .route("/api/posts", post(routes::posts::create_post))
        .route("/api/posts/{id}/comments", post(routes::posts::add_comment))
        .route("/api/posts/{id}/share", get(routes::posts::share))
        // Votes
        .route("/api/posts/{id}/vote", post(routes::votes::cast_vote))
        .with_state(state)
}
