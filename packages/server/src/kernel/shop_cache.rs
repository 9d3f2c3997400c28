//! Cache-aside store for scraped shop payloads.
//!
//! Keyed by (city, site URL). The cache is advisory everywhere: a read
//! failure degrades to an empty result, a write failure is logged and
//! forgotten, and a missing `DATABASE_URL` selects the no-op
//! implementation at startup. The search path must work identically in
//! all three modes.

use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use tracing::{debug, warn};

/// Freshness window: entries older than this are invisible to reads.
/// Stale rows are not deleted; a later successful scrape overwrites them.
pub const CACHE_TTL_HOURS: i64 = 6;

/// A cached shop payload with its capture time.
#[derive(Debug, Clone)]
pub struct CachedShop {
    pub shop_data: serde_json::Value,
    pub scraped_at: DateTime<Utc>,
}

fn freshness_cutoff() -> DateTime<Utc> {
    Utc::now() - Duration::hours(CACHE_TTL_HOURS)
}

/// Shop cache seam.
#[async_trait]
pub trait BaseShopCache: Send + Sync {
    /// All fresh entries for a city, keyed by site URL. Never fails:
    /// a backing-store error yields an empty map and a warning.
    async fn read_fresh(&self, city: &str) -> HashMap<String, CachedShop>;

    /// Replace-or-insert keyed by (city, site URL), timestamped at call
    /// time. Callers treat failures as log-and-continue; a lost write
    /// never affects the in-flight response.
    async fn upsert(&self, city: &str, site_url: &str, shop: &serde_json::Value) -> Result<()>;
}

#[derive(Debug, sqlx::FromRow)]
struct ShopCacheRow {
    site_url: String,
    shop_data: serde_json::Value,
    scraped_at: DateTime<Utc>,
}

/// Postgres-backed shop cache.
pub struct PostgresShopCache {
    pool: PgPool,
}

impl PostgresShopCache {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BaseShopCache for PostgresShopCache {
    async fn read_fresh(&self, city: &str) -> HashMap<String, CachedShop> {
        let rows = sqlx::query_as::<_, ShopCacheRow>(
            r#"
            SELECT site_url, shop_data, scraped_at
            FROM shop_cache
            WHERE city = $1 AND scraped_at > $2
            "#,
        )
        .bind(city)
        .bind(freshness_cutoff())
        .fetch_all(&self.pool)
        .await;

        match rows {
            Ok(rows) => rows
                .into_iter()
                .map(|row| {
                    (
                        row.site_url,
                        CachedShop {
                            shop_data: row.shop_data,
                            scraped_at: row.scraped_at,
                        },
                    )
                })
                .collect(),
            Err(e) => {
                warn!(city, error = %e, "Cache read failed, proceeding without cache");
                HashMap::new()
            }
        }
    }

    async fn upsert(&self, city: &str, site_url: &str, shop: &serde_json::Value) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO shop_cache (city, site_url, shop_data, scraped_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (city, site_url) DO UPDATE
            SET shop_data = EXCLUDED.shop_data,
                scraped_at = EXCLUDED.scraped_at
            "#,
        )
        .bind(city)
        .bind(site_url)
        .bind(shop)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to upsert shop cache entry")?;

        Ok(())
    }
}

/// No-op shop cache, selected when no database is configured.
pub struct NoopShopCache;

#[async_trait]
impl BaseShopCache for NoopShopCache {
    async fn read_fresh(&self, city: &str) -> HashMap<String, CachedShop> {
        debug!(city, "NoopShopCache: read skipped, cache disabled");
        HashMap::new()
    }

    async fn upsert(&self, city: &str, site_url: &str, _shop: &serde_json::Value) -> Result<()> {
        debug!(city, site_url, "NoopShopCache: dropping write, cache disabled");
        Ok(())
    }
}
