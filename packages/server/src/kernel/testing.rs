//! In-memory fakes for the scraper and cache seams.
//!
//! Shipped as a regular module (not `#[cfg(test)]`) so unit tests and the
//! integration tests in `tests/` share one set of fakes.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::common::SearchEvent;
use crate::kernel::scraper::BaseSiteScraper;
use crate::kernel::shop_cache::{BaseShopCache, CachedShop, CACHE_TTL_HOURS};
use crate::kernel::sink::EventSink;

/// Scripted outcome for one site.
#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    Success(serde_json::Value),
    SuccessWithPreview {
        preview_url: String,
        shop: serde_json::Value,
    },
    DelayedSuccess {
        delay: Duration,
        shop: serde_json::Value,
    },
    Failure,
}

/// Scraper fake that replays scripted outcomes and records its calls.
pub struct ScriptedScraper {
    outcomes: HashMap<String, ScriptedOutcome>,
    calls: Mutex<Vec<(String, Instant)>>,
}

impl ScriptedScraper {
    pub fn new(outcomes: impl IntoIterator<Item = (String, ScriptedOutcome)>) -> Self {
        Self {
            outcomes: outcomes.into_iter().collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Sites scraped so far, with the instant each upstream call was issued.
    pub fn calls(&self) -> Vec<(String, Instant)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl BaseSiteScraper for ScriptedScraper {
    async fn scrape(&self, site_url: &str, events: &EventSink) -> Result<serde_json::Value> {
        self.calls
            .lock()
            .unwrap()
            .push((site_url.to_string(), Instant::now()));

        let outcome = self
            .outcomes
            .get(site_url)
            .unwrap_or_else(|| panic!("No scripted outcome for {}", site_url))
            .clone();

        match outcome {
            ScriptedOutcome::Success(shop) => Ok(shop),
            ScriptedOutcome::SuccessWithPreview { preview_url, shop } => {
                events
                    .send(SearchEvent::LivePreview {
                        site: site_url.to_string(),
                        streaming_url: preview_url,
                    })
                    .await;
                Ok(shop)
            }
            ScriptedOutcome::DelayedSuccess { delay, shop } => {
                tokio::time::sleep(delay).await;
                Ok(shop)
            }
            ScriptedOutcome::Failure => bail!("scripted scrape failure for {}", site_url),
        }
    }
}

/// In-memory shop cache honoring the freshness window.
#[derive(Default)]
pub struct MemoryShopCache {
    entries: Mutex<HashMap<(String, String), CachedShop>>,
}

impl MemoryShopCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an entry with an explicit capture time (e.g. a stale one).
    pub fn insert_at(
        &self,
        city: &str,
        site_url: &str,
        shop_data: serde_json::Value,
        scraped_at: DateTime<Utc>,
    ) {
        self.entries.lock().unwrap().insert(
            (city.to_string(), site_url.to_string()),
            CachedShop {
                shop_data,
                scraped_at,
            },
        );
    }

    pub fn entry(&self, city: &str, site_url: &str) -> Option<CachedShop> {
        self.entries
            .lock()
            .unwrap()
            .get(&(city.to_string(), site_url.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

#[async_trait]
impl BaseShopCache for MemoryShopCache {
    async fn read_fresh(&self, city: &str) -> HashMap<String, CachedShop> {
        let cutoff = Utc::now() - chrono::Duration::hours(CACHE_TTL_HOURS);
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|((entry_city, _), entry)| entry_city == city && entry.scraped_at > cutoff)
            .map(|((_, site_url), entry)| (site_url.clone(), entry.clone()))
            .collect()
    }

    async fn upsert(&self, city: &str, site_url: &str, shop: &serde_json::Value) -> Result<()> {
        self.insert_at(city, site_url, shop.clone(), Utc::now());
        Ok(())
    }
}
