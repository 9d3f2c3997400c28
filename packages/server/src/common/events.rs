//! Outbound stream event payloads.
//!
//! These are the wire shapes the frontend consumes; every frame on the
//! search SSE stream is one of these serialized as JSON.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Where a shop result came from within a search session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultSource {
    Cache,
    Live,
}

/// One event on the outbound search stream.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum SearchEvent {
    /// A shop's scraped pricing payload, either replayed from cache or
    /// fresh from a live agent run.
    #[serde(rename = "SHOP_RESULT")]
    ShopResult {
        shop: serde_json::Value,
        source: ResultSource,
        #[serde(skip_serializing_if = "Option::is_none")]
        cached_at: Option<DateTime<Utc>>,
    },

    /// Progress-only signal: a live browser-preview URL for an in-flight
    /// agent run. Never persisted, no ordering guarantee across sites.
    #[serde(rename = "LIVE_PREVIEW")]
    LivePreview { site: String, streaming_url: String },

    /// Terminal event: one per session, after every site has settled.
    #[serde(rename = "SEARCH_COMPLETE")]
    SearchComplete {
        total: usize,
        succeeded: usize,
        cached: usize,
        elapsed: String,
    },
}
