//! Application configuration loaded from environment.

use std::net::SocketAddr;
use std::time::Duration;

/// Application configuration loaded from `.env` and environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g. `0.0.0.0:4000`).
    pub server_addr: SocketAddr,
    /// PostgreSQL connection URL. When unset the server runs on the in-memory store.
    pub database_url: Option<String>,
    /// JWT signing secret shared with the login service.
    pub jwt_secret: String,
    /// Log level: `error`, `warn`, `info`, `debug`, `trace`.
    pub log_level: String,
    /// Base URL of the media server that answers SDP offers.
    pub media_server_url: String,
    /// Per-request timeout for calls to the media server.
    pub media_timeout: Duration,
    /// Key expected in `x-app-key` from detection workers posting alerts.
    pub ingest_key: String,
}

impl Config {
    /// Load configuration from environment. Call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        let server_addr = std::env::var("SERVER_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:4000".to_string());
        let server_addr: SocketAddr = server_addr
            .parse()
            .map_err(|_| ConfigLoadError::InvalidServerAddr)?;

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());
        let jwt_secret = std::env::var("JWT_SECRET")
            .unwrap_or_else(|_| "camwatch_jwt_secret_change_in_production".to_string());
        if jwt_secret.is_empty() {
            return Err(ConfigLoadError::MissingJwtSecret);
        }
        let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let media_server_url = std::env::var("MEDIA_SERVER_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8889".to_string());
        let media_server_url = media_server_url.trim_end_matches('/').to_string();
        if !media_server_url.starts_with("http://") && !media_server_url.starts_with("https://") {
            return Err(ConfigLoadError::InvalidMediaServerUrl(media_server_url));
        }

        let media_timeout = match std::env::var("MEDIA_TIMEOUT_SECS") {
            Ok(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .ok_or(ConfigLoadError::InvalidMediaTimeout(raw))?,
            Err(_) => Duration::from_secs(10),
        };

        let ingest_key =
            std::env::var("INGEST_KEY").unwrap_or_else(|_| "camwatch_ingest_key".to_string());

        Ok(Self {
            server_addr,
            database_url,
            jwt_secret,
            log_level,
            media_server_url,
            media_timeout,
            ingest_key,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Invalid SERVER_ADDR")]
    InvalidServerAddr,
    #[error("JWT_SECRET must not be empty")]
    MissingJwtSecret,
    #[error("Invalid MEDIA_SERVER_URL: {0}")]
    InvalidMediaServerUrl(String),
    #[error("Invalid MEDIA_TIMEOUT_SECS: {0}")]
    InvalidMediaTimeout(String),
}
