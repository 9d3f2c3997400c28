//! Per-site scraping through the Mino browser-automation agent.
//!
//! One scrape is one streaming automation run: the agent drives a browser
//! against the shop's website and emits events until the run settles. Only
//! the event carrying `status == COMPLETED` holds the structured result.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use mino_client::MinoClient;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::common::SearchEvent;
use crate::kernel::sink::EventSink;

/// Hard per-site deadline, independent of sibling sites.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(270);

/// Extraction goal sent with every automation run.
pub const GOAL_PROMPT: &str = r#"You are extracting motorbike rental pricing from this website.

Steps:
1. Navigate to the pricing or rental page if not already there
2. Handle any popups or cookie banners by dismissing them
3. Find ALL motorbike/scooter listings with their prices
4. If there is a "Load More" button or pagination, click through all pages
5. Extract the following for each bike:
   - Bike name/model (e.g. "Honda Wave 110", "Yamaha NVX 155")
   - Engine size in cc (e.g. 110, 125, 155)
   - Bike type: one of "scooter", "semi-auto", "manual", "adventure"
   - Daily rental price in USD (convert from VND if needed: 1 USD = 25,000 VND)
   - Weekly rental price in USD (if available)
   - Monthly rental price in USD (if available)
   - Deposit amount in USD (if available)
   - Whether the bike is currently available (true/false)

Return a JSON object with this exact structure:
{
  "shop_name": "Name of the rental shop",
  "city": "City name",
  "website": "The URL you scraped",
  "bikes": [
    {
      "name": "Honda Wave 110",
      "engine_cc": 110,
      "type": "semi-auto",
      "price_daily_usd": 8,
      "price_weekly_usd": 50,
      "price_monthly_usd": 120,
      "currency": "USD",
      "deposit_usd": 100,
      "available": true
    }
  ],
  "notes": "Any relevant notes about the shop (e.g. helmet included, free delivery)"
}"#;

/// Scrapes one site per call.
///
/// Exactly one terminal outcome per invocation; progress signals (live
/// browser-preview URLs) go straight to the session sink as they appear,
/// independent of the final outcome. Implementations never retry.
#[async_trait]
pub trait BaseSiteScraper: Send + Sync {
    async fn scrape(&self, site_url: &str, events: &EventSink) -> Result<serde_json::Value>;
}

/// Mino-backed scraper implementation.
pub struct MinoScraper {
    client: MinoClient,
    goal: String,
    timeout: Duration,
}

impl MinoScraper {
    pub fn new(client: MinoClient) -> Self {
        Self {
            client,
            goal: GOAL_PROMPT.to_string(),
            timeout: REQUEST_TIMEOUT,
        }
    }

    /// Override the per-site deadline (tests, slow staging agents).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(&self, site_url: &str, events: &EventSink) -> Result<serde_json::Value> {
        let mut stream = self
            .client
            .run_automation(site_url, &self.goal)
            .await
            .context("Failed to start automation run")?;

        let mut result_json = None;

        // Read to stream end even after the terminal event; the agent is
        // expected to close the connection but not guaranteed to.
        while let Some(event) = stream.next().await {
            let event = event.context("Automation stream failed")?;

            if let Some(streaming_url) = event.streaming_url.clone() {
                events
                    .send(SearchEvent::LivePreview {
                        site: site_url.to_string(),
                        streaming_url,
                    })
                    .await;
            }

            if event.is_completed() {
                if let Some(payload) = event.result_json {
                    result_json = Some(payload);
                }
            }
        }

        result_json.ok_or_else(|| anyhow!("Stream finished without COMPLETED resultJson"))
    }
}

#[async_trait]
impl BaseSiteScraper for MinoScraper {
    async fn scrape(&self, site_url: &str, events: &EventSink) -> Result<serde_json::Value> {
        let started_at = Instant::now();
        info!(site = site_url, "Starting scrape");

        match tokio::time::timeout(self.timeout, self.run(site_url, events)).await {
            Ok(Ok(shop)) => {
                info!(
                    site = site_url,
                    elapsed = format!("{:.1}s", started_at.elapsed().as_secs_f64()),
                    "Scrape complete"
                );
                Ok(shop)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                warn!(site = site_url, timeout = ?self.timeout, "Scrape timed out");
                Err(anyhow!("Scrape timed out after {:?}", self.timeout))
            }
        }
    }
}
