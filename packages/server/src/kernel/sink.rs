//! Single-writer funnel for the outbound search stream.
//!
//! Cached flushes, live scrape tasks, and progress signals all complete
//! concurrently; funneling every emission through one mpsc channel keeps
//! frame boundaries intact without locking around the response body.

use tokio::sync::mpsc;

use crate::common::SearchEvent;

/// Cloneable handle for emitting events into one search session's stream.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::Sender<SearchEvent>,
}

impl EventSink {
    /// Create a sink and the receiver the SSE response drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<SearchEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Emit an event. A closed channel (client disconnected) drops the
    /// event silently; the session keeps running to completion regardless.
    pub async fn send(&self, event: SearchEvent) {
        if self.tx.send(event).await.is_err() {
            tracing::debug!("Dropping event for disconnected client");
        }
    }
}
