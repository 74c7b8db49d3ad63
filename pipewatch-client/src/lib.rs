//! Pipewatch HTTP Client
//!
//! A small, type-safe HTTP client for the pipeline backend that Pipewatch
//! monitors.
//!
//! The backend owns pipeline execution. This crate only issues commands
//! (start, cancel, reset), fetches the authoritative status snapshot and
//! subscribes to the realtime event stream.
//!
//! # Example
//!
//! ```no_run
//! use pipewatch_client::PipelineClient;
//!
//! #[tokio::main]
//! async fn main() -> pipewatch_client::Result<()> {
//!     let client = PipelineClient::new("http://localhost:8080");
//!
//!     let response = client.start_pipeline("data-refresh").await?;
//!     println!("started: {} ({})", response.success, response.message);
//!     Ok(())
//! }
//! ```

mod backend;
pub mod error;
mod events;
mod pipelines;

// Re-export commonly used types
pub use backend::{EventSource, PipelineBackend};
pub use error::{ClientError, Result};
pub use events::{EventStream, decode_event_stream, parse_event_line};

use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the pipeline backend API
///
/// Endpoints are grouped as:
/// - Pipeline commands (start, cancel, reset)
/// - Status snapshot
/// - Realtime events
#[derive(Debug, Clone)]
pub struct PipelineClient {
    /// Base URL of the backend (e.g., "http://localhost:8080")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl PipelineClient {
    /// Create a new pipeline client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the backend API (e.g., "http://localhost:8080")
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new pipeline client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    /// The realtime stream is long-lived, so avoid a total request timeout on
    /// clients used for [`PipelineClient::subscribe_events`].
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the backend
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Turn a non-success status into an [`ClientError::ApiError`]
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        Ok(response)
    }

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}
