//! Search endpoint.
//!
//! POST /api/search with `{"city": "<name>"}`.
//!
//! On success the response is a persistent SSE stream: cached shop results
//! flush first, live results land as each agent run settles, and one
//! SEARCH_COMPLETE event closes the session. Request-shape errors (bad
//! JSON, unknown city, missing credential) are rejected before the stream
//! opens.

use std::convert::Infallible;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::{header, HeaderName},
    response::sse::{Event, KeepAlive, Sse},
    response::IntoResponse,
    Json,
};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use tokio_stream::wrappers::ReceiverStream;

use crate::common::SearchError;
use crate::kernel::{regions, EventSink, SearchSession};
use crate::server::app::AppState;

#[derive(Deserialize)]
pub struct SearchBody {
    city: String,
}

/// Search stream handler.
///
/// The session runs in its own task, detached from this response future:
/// a client that disconnects mid-search stops receiving frames but does
/// not cancel scraping or cache persistence.
pub async fn search_handler(
    Extension(state): Extension<AppState>,
    payload: Result<Json<SearchBody>, JsonRejection>,
) -> Result<impl IntoResponse, SearchError> {
    let Json(body) = payload.map_err(|_| SearchError::InvalidBody)?;
    let city = body.city.trim().to_lowercase();

    let sites = regions::sites_for_city(&city).ok_or(SearchError::UnsupportedCity)?;
    let scraper = state.scraper.clone().ok_or(SearchError::MissingApiKey)?;

    let (sink, rx) = EventSink::channel(64);
    let session = SearchSession::new(
        city,
        sites.iter().map(|s| s.to_string()).collect(),
        scraper,
        state.cache.clone(),
        sink,
    );
    tokio::spawn(session.run());

    // The very first frame is a comment, sent before any real work
    // completes, to force the connection open through buffering
    // intermediaries.
    let ping = stream::once(async { Ok::<_, Infallible>(Event::default().comment("ping")) });
    let events = ReceiverStream::new(rx)
        .filter_map(|event| async move { Event::default().json_data(&event).ok().map(Ok) });

    let sse = Sse::new(ping.chain(events)).keep_alive(KeepAlive::default());

    Ok((
        [
            (header::CACHE_CONTROL, "no-cache, no-transform"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        sse,
    ))
}
