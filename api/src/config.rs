use std::time::Duration;

/// Service settings, read from the environment with development defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub cors_origin: String,
    pub bind_addr: String,
    pub share_base_url: String,
    /// Feed sessions untouched this long, with no event stream, are closed.
    pub feed_idle_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "bookforum.db".to_string()),
            jwt_secret: std::env::var("JWT_SECRET")
                .unwrap_or_else(|_| "dev-secret-change-me".to_string()),
            cors_origin: std::env::var("CORS_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            share_base_url: std::env::var("SHARE_BASE_URL")
                .unwrap_or_else(|_| "https://bookclub-khaki.vercel.app".to_string()),
            feed_idle_timeout: Duration::from_secs(
                std::env::var("FEED_IDLE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(300),
            ),
        }
    }
}
