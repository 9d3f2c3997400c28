//! Pure Mino automation API client
//!
//! A clean, minimal client for the Mino browser-automation service with no
//! domain-specific logic. A run is one streaming request: the agent drives a
//! real browser against the target URL, pursuing the caller's goal, and emits
//! SSE events until the run settles.
//!
//! # Example
//!
//! ```rust,ignore
//! use futures::StreamExt;
//! use mino_client::MinoClient;
//!
//! let client = MinoClient::from_env()?;
//! let mut stream = client
//!     .run_automation("https://example.com/prices", "Extract all prices as JSON")
//!     .await?;
//!
//! while let Some(event) = stream.next().await {
//!     let event = event?;
//!     if event.is_completed() {
//!         println!("{:?}", event.result_json);
//!     }
//! }
//! ```

pub mod error;
pub mod streaming;

pub use error::{MinoError, Result};
pub use streaming::{AutomationEvent, AutomationStream};

use reqwest::Client;
use tracing::debug;

/// Default endpoint for streaming automation runs.
pub const DEFAULT_BASE_URL: &str = "https://agent.tinyfish.ai/v1/automation/run-sse";

#[derive(serde::Serialize)]
struct RunRequest<'a> {
    url: &'a str,
    goal: &'a str,
}

/// Pure Mino API client.
#[derive(Clone)]
pub struct MinoClient {
    http_client: Client,
    api_key: String,
    base_url: String,
}

impl MinoClient {
    /// Create a new Mino client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Create from environment variable `MINO_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("MINO_API_KEY")
            .map_err(|_| MinoError::Config("MINO_API_KEY not set".into()))?;
        Ok(Self::new(api_key))
    }

    /// Set a custom base URL (for proxies or test servers).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Start a streaming automation run against `url` with the given goal.
    ///
    /// Returns a stream of [`AutomationEvent`]s. The connection is expected to
    /// close after the terminal event, but callers should keep reading until
    /// the stream ends rather than assume it does.
    pub async fn run_automation(&self, url: &str, goal: &str) -> Result<AutomationStream> {
        debug!(url, "Starting automation run");

        let response = self
            .http_client
            .post(&self.base_url)
            .header("X-API-Key", &self.api_key)
            .header("Accept", "text/event-stream")
            .json(&RunRequest { url, goal })
            .send()
            .await
            .map_err(|e| MinoError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MinoError::Api(format!(
                "Automation run failed ({}): {}",
                status, body
            )));
        }

        Ok(AutomationStream::new(response.bytes_stream()))
    }
}
