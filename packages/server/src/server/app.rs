//! Application setup and server configuration.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{header::CONTENT_TYPE, Method},
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::kernel::{BaseShopCache, BaseSiteScraper, NoopShopCache, PostgresShopCache};
use crate::server::routes::{health_handler, search_handler};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db_pool: Option<PgPool>,
    pub cache: Arc<dyn BaseShopCache>,
    /// Absent when no automation credential is configured; search requests
    /// are rejected with a 500 until it is.
    pub scraper: Option<Arc<dyn BaseSiteScraper>>,
}

/// Build the Axum application router.
///
/// The cache implementation is selected here: Postgres when a pool is
/// available, otherwise the no-op cache (every search runs fully live).
pub fn build_app(pool: Option<PgPool>, scraper: Option<Arc<dyn BaseSiteScraper>>) -> Router {
    let cache: Arc<dyn BaseShopCache> = match pool.clone() {
        Some(pool) => Arc::new(PostgresShopCache::new(pool)),
        None => Arc::new(NoopShopCache),
    };

    router(AppState {
        db_pool: pool,
        cache,
        scraper,
    })
}

/// Assemble the router for the given state.
pub fn router(state: AppState) -> Router {
    // CORS configuration - the search page may be served from another origin
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE]);

    Router::new()
        .route("/api/search", post(search_handler))
        .route("/health", get(health_handler))
        .layer(Extension(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
