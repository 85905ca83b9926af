//! Network transport used to deliver a single event.
//!
//! The [`Transport`] trait is the seam between delivery policy (timeouts,
//! classification, retries) and the actual network call. [`HttpTransport`]
//! is the reqwest-backed implementation used in production.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;

use crate::error::ConfigError;

/// A single outbound request.
#[derive(Debug, Clone)]
pub struct DeliveryRequest {
    /// Destination address
    pub url: String,

    /// Header name/value pairs
    pub headers: Vec<(String, String)>,

    /// Serialized event
    pub body: Vec<u8>,
}

/// Response received from the collector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,

    /// Response body, empty if it could not be read
    pub body: String,
}

/// Errors raised before a response was received.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request timed out
    #[error("request timed out")]
    Timeout,

    /// Connection or protocol failure
    #[error("request failed: {0}")]
    Network(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

/// Performs one POST and reports the status, or why there was none.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: DeliveryRequest) -> Result<TransportResponse, TransportError>;
}

/// reqwest-backed transport.
///
/// The underlying client is reused across requests for connection pooling.
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
}

impl HttpTransport {
    /// Create a transport whose requests are bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::HttpClient` if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self { client, timeout })
    }

    /// Get the request timeout duration.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: DeliveryRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = self
            .client
            .post(&request.url)
            .timeout(self.timeout)
            .body(request.body);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();

        // Best effort: the body is only used for diagnostics
        let body = response.text().await.unwrap_or_default();

        Ok(TransportResponse { status, body })
    }
}
