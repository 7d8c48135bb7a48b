use std::sync::Arc;
use std::time::Duration;

use bookforum_api::{config::Config, store::SqliteStore, AppState};
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    let store = SqliteStore::open(&config.database_url).expect("Failed to open database");
    let state = AppState::new(Arc::new(store), &config);
    let sweep_every = (config.feed_idle_timeout / 4).max(Duration::from_secs(1));
    state
        .feeds
        .spawn_reaper(config.feed_idle_timeout, sweep_every);

    let cors = CorsLayer::new()
        .allow_origin(
            config
                .cors_origin
                .parse::<axum::http::HeaderValue>()
                .expect("Invalid CORS_ORIGIN"),
        )
        .allow_methods(AllowMethods::any())
        .allow_headers(AllowHeaders::any());

    let app = bookforum_api::app(state).layer(cors);

    info!(addr = %config.bind_addr, "API server listening");
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind");
    axum::serve(listener, app).await.expect("Server error");
}
