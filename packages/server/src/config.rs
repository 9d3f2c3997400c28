use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string. Absent means the shop cache is disabled
    /// and every search runs fully live.
    pub database_url: Option<String>,
    pub port: u16,
    /// Mino automation API key. Absent does not stop the server booting;
    /// search requests are rejected with a 500 until it is configured.
    pub mino_api_key: Option<String>,
    pub mino_api_url: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").ok(),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            mino_api_key: env::var("MINO_API_KEY").ok(),
            mino_api_url: env::var("MINO_API_URL")
                .unwrap_or_else(|_| mino_client::DEFAULT_BASE_URL.to_string()),
        })
    }
}
