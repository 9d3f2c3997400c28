//! Search session orchestration.
//!
//! One session per inbound search request: partition the city's sites into
//! cached hits and live candidates, flush the cached hits, fan out one
//! staggered scrape task per live site, relay every outcome into the
//! session's event sink, and emit a single completion tally once all sites
//! have settled.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::common::{ResultSource, SearchEvent};
use crate::kernel::scraper::BaseSiteScraper;
use crate::kernel::shop_cache::BaseShopCache;
use crate::kernel::sink::EventSink;

/// Delay between starting successive live scrape tasks. Throttles burst
/// load on the agent fleet without serializing the whole batch.
pub const REQUEST_STAGGER: Duration = Duration::from_millis(500);

/// State for one search request, from partition to completion.
///
/// The session is the sole writer of its counters; per-task outcomes come
/// back through join results rather than shared mutable state.
pub struct SearchSession {
    search_id: Uuid,
    city: String,
    sites: Vec<String>,
    scraper: Arc<dyn BaseSiteScraper>,
    cache: Arc<dyn BaseShopCache>,
    events: EventSink,
}

impl SearchSession {
    pub fn new(
        city: impl Into<String>,
        sites: Vec<String>,
        scraper: Arc<dyn BaseSiteScraper>,
        cache: Arc<dyn BaseShopCache>,
        events: EventSink,
    ) -> Self {
        Self {
            search_id: Uuid::new_v4(),
            city: city.into(),
            sites,
            scraper,
            cache,
            events,
        }
    }

    /// Drive the session to completion.
    ///
    /// Runs detached from the HTTP response future: a client that
    /// disconnects mid-search stops receiving events but does not stop
    /// scraping or cache persistence.
    pub async fn run(self) {
        let started_at = Instant::now();
        let total = self.sites.len();
        info!(
            search_id = %self.search_id,
            city = %self.city,
            total,
            "Search started"
        );

        // Partition once, synchronously, before any live task starts.
        let cached = self.cache.read_fresh(&self.city).await;

        let mut cached_count = 0;
        let mut live_sites = Vec::new();
        for site in &self.sites {
            match cached.get(site.as_str()) {
                Some(entry) => {
                    cached_count += 1;
                    self.events
                        .send(SearchEvent::ShopResult {
                            shop: entry.shop_data.clone(),
                            source: ResultSource::Cache,
                            cached_at: Some(entry.scraped_at),
                        })
                        .await;
                }
                None => live_sites.push(site.clone()),
            }
        }
        debug!(
            search_id = %self.search_id,
            cached = cached_count,
            live = live_sites.len(),
            "Partitioned sites"
        );

        // Staggered fan-out: every live site gets its own task, started
        // i x STAGGER after streaming began, all running independently.
        let mut tasks = JoinSet::new();
        for (i, site) in live_sites.into_iter().enumerate() {
            let scraper = self.scraper.clone();
            let cache = self.cache.clone();
            let events = self.events.clone();
            let city = self.city.clone();

            tasks.spawn(async move {
                tokio::time::sleep(REQUEST_STAGGER * i as u32).await;

                match scraper.scrape(&site, &events).await {
                    Ok(shop) => {
                        // Issue the cache write before the emit so a client
                        // disconnect cannot cancel a write already owed to
                        // the cache. The write task outlives the session.
                        let write_cache = cache.clone();
                        let write_city = city.clone();
                        let write_site = site.clone();
                        let write_shop = shop.clone();
                        tokio::spawn(async move {
                            if let Err(e) = write_cache
                                .upsert(&write_city, &write_site, &write_shop)
                                .await
                            {
                                warn!(site = %write_site, error = %e, "Cache upsert failed");
                            }
                        });

                        events
                            .send(SearchEvent::ShopResult {
                                shop,
                                source: ResultSource::Live,
                                cached_at: None,
                            })
                            .await;
                        true
                    }
                    Err(e) => {
                        warn!(site = %site, error = %e, "Site scrape failed");
                        false
                    }
                }
            });
        }

        // Join barrier: completion only after every live task settles.
        let mut live_successes = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(true) => live_successes += 1,
                Ok(false) => {}
                Err(e) => warn!(search_id = %self.search_id, error = %e, "Scrape task panicked"),
            }
        }

        let succeeded = cached_count + live_successes;
        let elapsed = format!("{:.1}s", started_at.elapsed().as_secs_f64());
        info!(
            search_id = %self.search_id,
            total,
            succeeded,
            cached = cached_count,
            elapsed = %elapsed,
            "Search complete"
        );

        self.events
            .send(SearchEvent::SearchComplete {
                total,
                succeeded,
                cached: cached_count,
                elapsed,
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::testing::{MemoryShopCache, ScriptedOutcome, ScriptedScraper};
    use chrono::Utc;
    use std::collections::HashMap;
    use tokio::sync::mpsc;

    fn shop(name: &str) -> serde_json::Value {
        serde_json::json!({ "shop_name": name, "bikes": [] })
    }

    fn sites(urls: &[&str]) -> Vec<String> {
        urls.iter().map(|s| s.to_string()).collect()
    }

    /// Run a session to completion and return every emitted event, the
    /// completion event last.
    async fn run_and_collect(
        city: &str,
        site_list: Vec<String>,
        scraper: Arc<ScriptedScraper>,
        cache: Arc<MemoryShopCache>,
    ) -> Vec<SearchEvent> {
        let (sink, rx) = EventSink::channel(64);
        let session = SearchSession::new(city, site_list, scraper, cache, sink);

        let handle = tokio::spawn(session.run());
        let events = collect_until_complete(rx).await;
        handle.await.unwrap();
        events
    }

    async fn collect_until_complete(mut rx: mpsc::Receiver<SearchEvent>) -> Vec<SearchEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            let done = matches!(event, SearchEvent::SearchComplete { .. });
            events.push(event);
            if done {
                break;
            }
        }
        events
    }

    fn completion(events: &[SearchEvent]) -> (usize, usize, usize) {
        match events.last() {
            Some(SearchEvent::SearchComplete {
                total,
                succeeded,
                cached,
                ..
            }) => (*total, *succeeded, *cached),
            other => panic!("Expected SEARCH_COMPLETE last, got {:?}", other),
        }
    }

    fn shop_results(events: &[SearchEvent]) -> Vec<(&serde_json::Value, ResultSource)> {
        events
            .iter()
            .filter_map(|e| match e {
                SearchEvent::ShopResult { shop, source, .. } => Some((shop, *source)),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_all_cached_skips_live_phase() {
        let site_list = sites(&["https://a.example", "https://b.example"]);
        let cache = Arc::new(MemoryShopCache::new());
        cache.insert_at("alpha", "https://a.example", shop("a"), Utc::now());
        cache.insert_at("alpha", "https://b.example", shop("b"), Utc::now());
        let scraper = Arc::new(ScriptedScraper::new(HashMap::new()));

        let events =
            run_and_collect("alpha", site_list, scraper.clone(), cache).await;

        let results = shop_results(&events);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|(_, src)| *src == ResultSource::Cache));
        assert_eq!(completion(&events), (2, 2, 2));
        assert_eq!(scraper.call_count(), 0, "no live calls may be issued");
    }

    #[tokio::test]
    async fn test_live_failures_reflected_only_in_tally() {
        let site_list = sites(&["https://a.example", "https://b.example", "https://c.example"]);
        let scraper = Arc::new(ScriptedScraper::new([
            (
                "https://a.example".to_string(),
                ScriptedOutcome::Success(shop("a")),
            ),
            ("https://b.example".to_string(), ScriptedOutcome::Failure),
            (
                "https://c.example".to_string(),
                ScriptedOutcome::Success(shop("c")),
            ),
        ]));
        let cache = Arc::new(MemoryShopCache::new());

        let events = run_and_collect("beta", site_list, scraper, cache).await;

        let results = shop_results(&events);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|(_, src)| *src == ResultSource::Live));
        // Order among live results is unconstrained; compare as a set
        let names: std::collections::HashSet<_> = results
            .iter()
            .map(|(shop, _)| shop["shop_name"].as_str().unwrap())
            .collect();
        assert_eq!(names, ["a", "c"].into_iter().collect());
        assert_eq!(completion(&events), (3, 2, 0));
    }

    #[tokio::test]
    async fn test_all_live_failures_still_complete() {
        let site_list = sites(&["https://a.example", "https://b.example"]);
        let scraper = Arc::new(ScriptedScraper::new([
            ("https://a.example".to_string(), ScriptedOutcome::Failure),
            ("https://b.example".to_string(), ScriptedOutcome::Failure),
        ]));
        let cache = Arc::new(MemoryShopCache::new());

        let events = run_and_collect("beta", site_list, scraper, cache).await;

        assert!(shop_results(&events).is_empty());
        assert_eq!(completion(&events), (2, 0, 0));
    }

    #[tokio::test]
    async fn test_cached_hits_flush_before_any_live_result() {
        let site_list = sites(&["https://cached.example", "https://live.example"]);
        let cache = Arc::new(MemoryShopCache::new());
        cache.insert_at("hcmc", "https://cached.example", shop("cached"), Utc::now());
        let scraper = Arc::new(ScriptedScraper::new([(
            "https://live.example".to_string(),
            ScriptedOutcome::Success(shop("live")),
        )]));

        let events = run_and_collect("hcmc", site_list, scraper, cache).await;

        let results = shop_results(&events);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].1, ResultSource::Cache);
        assert_eq!(results[1].1, ResultSource::Live);
        assert_eq!(completion(&events), (2, 2, 1));
    }

    #[tokio::test]
    async fn test_stale_entry_triggers_live_call() {
        let site_list = sites(&["https://a.example"]);
        let cache = Arc::new(MemoryShopCache::new());
        cache.insert_at(
            "hcmc",
            "https://a.example",
            shop("stale"),
            Utc::now() - chrono::Duration::hours(7),
        );
        let scraper = Arc::new(ScriptedScraper::new([(
            "https://a.example".to_string(),
            ScriptedOutcome::Success(shop("fresh")),
        )]));

        let events = run_and_collect("hcmc", site_list, scraper.clone(), cache).await;

        assert_eq!(scraper.call_count(), 1, "stale entry must be re-scraped");
        let results = shop_results(&events);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].1, ResultSource::Live);
        assert_eq!(completion(&events), (1, 1, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_tasks_start_staggered() {
        let site_list = sites(&["https://a.example", "https://b.example", "https://c.example"]);
        let scraper = Arc::new(ScriptedScraper::new([
            (
                "https://a.example".to_string(),
                ScriptedOutcome::Success(shop("a")),
            ),
            (
                "https://b.example".to_string(),
                ScriptedOutcome::Success(shop("b")),
            ),
            (
                "https://c.example".to_string(),
                ScriptedOutcome::Success(shop("c")),
            ),
        ]));
        let cache = Arc::new(MemoryShopCache::new());

        let started = Instant::now();
        run_and_collect("hcmc", site_list.clone(), scraper.clone(), cache).await;

        let call_offsets: HashMap<String, Duration> = scraper
            .calls()
            .into_iter()
            .map(|(site, at)| (site, at - started))
            .collect();

        for (i, site) in site_list.iter().enumerate() {
            let offset = call_offsets[site];
            assert!(
                offset >= REQUEST_STAGGER * i as u32,
                "site {} started at {:?}, before its {:?} stagger slot",
                site,
                offset,
                REQUEST_STAGGER * i as u32
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_site_does_not_block_siblings() {
        let site_list = sites(&["https://slow.example", "https://fast.example"]);
        let scraper = Arc::new(ScriptedScraper::new([
            (
                "https://slow.example".to_string(),
                ScriptedOutcome::DelayedSuccess {
                    delay: Duration::from_secs(60),
                    shop: shop("slow"),
                },
            ),
            (
                "https://fast.example".to_string(),
                ScriptedOutcome::Success(shop("fast")),
            ),
        ]));
        let cache = Arc::new(MemoryShopCache::new());

        let events = run_and_collect("hcmc", site_list, scraper, cache).await;

        let results = shop_results(&events);
        // The fast site's result lands first even though the slow site
        // was scheduled first
        assert_eq!(results[0].0["shop_name"], "fast");
        assert_eq!(results[1].0["shop_name"], "slow");
        assert_eq!(completion(&events), (2, 2, 0));
    }

    #[tokio::test]
    async fn test_live_success_is_persisted() {
        let site = "https://a.example";
        let site_list = sites(&[site]);
        let scraper = Arc::new(ScriptedScraper::new([(
            site.to_string(),
            ScriptedOutcome::Success(shop("a")),
        )]));
        let cache = Arc::new(MemoryShopCache::new());

        let events = run_and_collect("hcmc", site_list, scraper, cache.clone()).await;
        assert_eq!(completion(&events), (1, 1, 0));

        // The upsert task is detached from the session; give it a moment
        let mut entry = None;
        for _ in 0..50 {
            entry = cache.entry("hcmc", site);
            if entry.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let entry = entry.expect("live success must be written to the cache");
        assert_eq!(entry.shop_data["shop_name"], "a");
    }

    #[tokio::test]
    async fn test_preview_events_are_forwarded() {
        let site = "https://a.example";
        let site_list = sites(&[site]);
        let scraper = Arc::new(ScriptedScraper::new([(
            site.to_string(),
            ScriptedOutcome::SuccessWithPreview {
                preview_url: "https://preview.example/run/1".to_string(),
                shop: shop("a"),
            },
        )]));
        let cache = Arc::new(MemoryShopCache::new());

        let events = run_and_collect("hcmc", site_list, scraper, cache).await;

        let preview = events
            .iter()
            .find_map(|e| match e {
                SearchEvent::LivePreview {
                    site,
                    streaming_url,
                } => Some((site.clone(), streaming_url.clone())),
                _ => None,
            })
            .expect("preview sighting must be forwarded");
        assert_eq!(preview.0, site);
        assert_eq!(preview.1, "https://preview.example/run/1");
    }

    #[tokio::test]
    async fn test_disconnected_client_does_not_stop_persistence() {
        let site = "https://a.example";
        let site_list = sites(&[site]);
        let scraper = Arc::new(ScriptedScraper::new([(
            site.to_string(),
            ScriptedOutcome::Success(shop("a")),
        )]));
        let cache = Arc::new(MemoryShopCache::new());

        let (sink, rx) = EventSink::channel(64);
        drop(rx); // client went away before any event was delivered

        let session = SearchSession::new("hcmc", site_list, scraper, cache.clone(), sink);
        session.run().await;

        let mut entry = None;
        for _ in 0..50 {
            entry = cache.entry("hcmc", site);
            if entry.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(entry.is_some(), "cache write must survive the disconnect");
    }
}
