//! Delivery of a single event to the collector.
//!
//! Each event is POSTed on its own. The response is classified as:
//! - 2xx: delivered
//! - 4xx: permanent failure, never retried
//! - anything else, a timeout or a network error: transient failure
//!
//! Transient failures are retried in place with exponential backoff
//! (1s, 2s, 4s, ... capped at 10s) up to `retry_limit` times. Once retries
//! are exhausted the error is returned so the flusher can requeue the event
//! for a later flush.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error};

use crate::config::ClientConfig;
use crate::error::{DeliveryError, TransientReason};
use crate::event::EventRecord;
use crate::stats::ClientStats;
use crate::transport::{DeliveryRequest, Transport, TransportError};

/// Base delay for exponential backoff (in milliseconds).
const BASE_DELAY_MS: u64 = 1_000;

/// Maximum delay between retries (in milliseconds).
const MAX_RETRY_DELAY_MS: u64 = 10_000;

/// Header carrying the credential.
const API_KEY_HEADER: &str = "X-API-Key";

/// Delay before retry number `attempt + 1`: `min(2^attempt * 1s, 10s)`.
pub fn backoff_delay(attempt: u32) -> Duration {
    let exponential = BASE_DELAY_MS.saturating_mul(1u64 << attempt.min(16));
    Duration::from_millis(exponential.min(MAX_RETRY_DELAY_MS))
}

/// Sends events one at a time, retrying transient failures in place.
pub struct Deliverer {
    transport: Arc<dyn Transport>,
    url: String,
    api_key: String,
    timeout: Duration,
    retry_limit: u32,
    debug: bool,
    stats: Arc<ClientStats>,
}

impl Deliverer {
    /// Create a deliverer for an already normalized configuration.
    pub fn new(
        config: &ClientConfig,
        transport: Arc<dyn Transport>,
        stats: Arc<ClientStats>,
    ) -> Self {
        Self {
            transport,
            url: config.host.clone(),
            api_key: config.api_key.clone(),
            timeout: config.timeout,
            retry_limit: config.retry_limit,
            debug: config.debug,
            stats,
        }
    }

    /// Deliver one event.
    ///
    /// Re-sends the identical payload on each retry. Returns the last error
    /// once the event is given up on: immediately for a permanent failure,
    /// after `retry_limit` retries for a transient one.
    pub async fn send(&self, record: &EventRecord) -> Result<(), DeliveryError> {
        let body =
            serde_json::to_vec(record).map_err(|e| DeliveryError::Serialization(e.to_string()))?;

        let mut attempt: u32 = 0;
        loop {
            let err = match self.send_once(&body).await {
                Ok(()) => {
                    self.stats.record_delivered();
                    return Ok(());
                }
                Err(e) => e,
            };

            if !err.is_retryable() {
                error!(
                    error = %err,
                    event = %record.event,
                    message_id = %record.message_id,
                    "Permanent delivery error, not retrying"
                );
                return Err(err);
            }

            if attempt >= self.retry_limit {
                debug!(
                    error = %err,
                    event = %record.event,
                    attempts = attempt + 1,
                    "Delivery failed, retries exhausted"
                );
                return Err(err);
            }

            let delay = backoff_delay(attempt);
            debug!(
                error = %err,
                event = %record.event,
                attempt = attempt + 1,
                retry_limit = self.retry_limit,
                delay_ms = delay.as_millis() as u64,
                "Retrying event delivery"
            );
            self.stats.record_retry();
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Send a single request without retry logic and classify the outcome.
    async fn send_once(&self, body: &[u8]) -> Result<(), DeliveryError> {
        let request = DeliveryRequest {
            url: self.url.clone(),
            headers: vec![
                (API_KEY_HEADER.to_string(), self.api_key.clone()),
                ("Content-Type".to_string(), "application/json".to_string()),
            ],
            body: body.to_vec(),
        };

        let outcome = tokio::time::timeout(self.timeout, self.transport.send(request)).await;
        let response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(TransportError::Timeout)) | Err(_) => {
                return Err(DeliveryError::Transient(TransientReason::Timeout));
            }
            Ok(Err(TransportError::Network(message))) => {
                return Err(DeliveryError::Transient(TransientReason::Network(message)));
            }
        };

        match response.status {
            200..=299 => {
                if self.debug {
                    debug!(
                        status = response.status,
                        response = %response.body,
                        "Event sent successfully"
                    );
                }
                Ok(())
            }
            400..=499 => Err(DeliveryError::Permanent {
                status: response.status,
                message: response.body,
            }),
            status => Err(DeliveryError::Transient(TransientReason::Server {
                status,
                message: response.body,
            })),
        }
    }
}
