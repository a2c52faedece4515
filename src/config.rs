//! Server configuration

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Database URL
    pub database_url: String,
    /// Audio sample rate in Hz; also the frame size in bytes (one second of
    /// 8-bit audio per tick)
    pub sample_rate: u32,
    /// Deadline for writing one frame to a subscriber, in milliseconds
    pub write_timeout_ms: u64,
    /// Maximum total WebSocket connections (0 = unlimited)
    pub max_connections: usize,
    /// Comma-separated list of allowed CORS origins (empty = permissive)
    pub cors_origins: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = ServerConfig {
            host: env::var("RW_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("RW_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .context("Invalid RW_PORT")?,
            database_url: env::var("RW_DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://./data/transmitter.db".to_string()),
            sample_rate: env::var("RW_SAMPLE_RATE")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .context("Invalid RW_SAMPLE_RATE")?,
            write_timeout_ms: env::var("RW_WRITE_TIMEOUT_MS")
                .unwrap_or_else(|_| "500".to_string())
                .parse()
                .context("Invalid RW_WRITE_TIMEOUT_MS")?,
            max_connections: env::var("RW_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "2000".to_string())
                .parse()
                .context("Invalid RW_MAX_CONNECTIONS")?,
            cors_origins: env::var("RW_CORS_ORIGINS").ok(),
        };

        Ok(config)
    }
}
