// Main entry point for the rental search API server

use std::sync::Arc;

use anyhow::{Context, Result};
use mino_client::MinoClient;
use server_core::kernel::{BaseSiteScraper, MinoScraper};
use server_core::server::app::build_app;
use server_core::Config;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,server_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Saigon Wheels rental search API");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;

    // Connect to the cache database when configured
    let pool = match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting to database...");
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await
                .context("Failed to connect to database")?;

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("Failed to run migrations")?;
            tracing::info!("Database connected, migrations complete");
            Some(pool)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, running with shop cache disabled");
            None
        }
    };

    // Construct the scraping agent client when a credential is present
    let scraper: Option<Arc<dyn BaseSiteScraper>> = match &config.mino_api_key {
        Some(key) => {
            let client = MinoClient::new(key.clone()).with_base_url(config.mino_api_url.clone());
            Some(Arc::new(MinoScraper::new(client)))
        }
        None => {
            tracing::warn!("MINO_API_KEY not set, search requests will be rejected");
            None
        }
    };

    // Build application
    let app = build_app(pool, scraper);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
