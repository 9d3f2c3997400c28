//! SSE streaming parser for Mino automation runs.
//!
//! Converts a raw `reqwest` byte stream into `AutomationEvent` values.
//! Handles partial lines, buffering, and malformed event payloads.

use bytes::Bytes;
use futures::stream::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::error::MinoError;

/// A single event from a streaming automation run.
///
/// The agent emits many intermediate events; only the one with
/// `status == "COMPLETED"` carries the authoritative `result_json`.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct AutomationEvent {
    /// Run status (e.g. "RUNNING", "COMPLETED").
    #[serde(default)]
    pub status: Option<String>,
    /// Structured extraction result, present on the terminal event.
    #[serde(default, rename = "resultJson")]
    pub result_json: Option<serde_json::Value>,
    /// Live browser-preview URL for the run, may appear on any event.
    #[serde(default, rename = "streamingUrl")]
    pub streaming_url: Option<String>,
}

impl AutomationEvent {
    /// Whether this is the terminal event of the run.
    pub fn is_completed(&self) -> bool {
        self.status.as_deref() == Some("COMPLETED")
    }
}

/// Stream adapter that converts raw SSE bytes into `AutomationEvent` values.
///
/// Malformed `data:` payloads are skipped rather than surfaced: one garbled
/// line from the agent must not kill an otherwise healthy run.
pub struct AutomationStream {
    inner: Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>,
    buffer: String,
}

impl AutomationStream {
    pub(crate) fn new(
        byte_stream: impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
    ) -> Self {
        Self {
            inner: Box::pin(byte_stream),
            buffer: String::new(),
        }
    }
}

impl Stream for AutomationStream {
    type Item = Result<AutomationEvent, MinoError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            // Try to parse a complete event from buffered lines
            if let Some(event) = try_parse_line(&mut this.buffer) {
                return Poll::Ready(Some(Ok(event)));
            }

            // Need more data from the byte stream
            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    match std::str::from_utf8(&bytes) {
                        Ok(text) => this.buffer.push_str(text),
                        Err(e) => {
                            return Poll::Ready(Some(Err(MinoError::Parse(format!(
                                "Invalid UTF-8 in stream: {}",
                                e
                            )))));
                        }
                    }
                    // Loop to try parsing again
                }
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(MinoError::Network(e.to_string()))));
                }
                Poll::Ready(None) => {
                    // Stream ended — a trailing line without a newline may remain
                    if !this.buffer.ends_with('\n') && !this.buffer.trim().is_empty() {
                        this.buffer.push('\n');
                        if let Some(event) = try_parse_line(&mut this.buffer) {
                            return Poll::Ready(Some(Ok(event)));
                        }
                    }
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Try to extract and parse a complete SSE event line from the buffer.
/// Returns `None` if no complete, well-formed event is available yet.
fn try_parse_line(buffer: &mut String) -> Option<AutomationEvent> {
    loop {
        let newline_pos = buffer.find('\n')?;
        let line = buffer[..newline_pos].trim().to_string();
        buffer.drain(..=newline_pos);

        // Blank lines are event separators; comment and id/retry lines carry nothing
        if line.is_empty() {
            continue;
        }

        if let Some(data) = line.strip_prefix("data: ") {
            match serde_json::from_str::<AutomationEvent>(data.trim()) {
                Ok(event) => return Some(event),
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping malformed automation event line");
                    continue;
                }
            }
        }

        // Skip non-data lines (e.g. "event:", "id:", ": keep-alive")
    }
}
