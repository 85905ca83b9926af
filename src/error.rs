//! Error types for the analytics client.
//!
//! Construction and argument errors surface synchronously to the caller.
//! Delivery errors never reach producers: they are consumed by the flusher,
//! which requeues transient failures and drops permanent ones.

use thiserror::Error;

/// Errors raised while building or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No credential was supplied.
    #[error("API key is required")]
    MissingApiKey,

    /// An environment variable holds an unusable value.
    #[error("Configuration error for {env_var}: {message}")]
    InvalidValue { env_var: String, message: String },

    /// The client was constructed outside a tokio runtime.
    #[error("analytics client must be created within a tokio runtime")]
    NoRuntime,

    /// The HTTP transport could not be built.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Errors returned by the public client operations.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// Fatal configuration problem at construction time.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Invalid arguments to `track`, `identify` or `group`.
    #[error("invalid argument: {0}")]
    Validation(String),
}

/// Why a delivery attempt is worth retrying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransientReason {
    /// The collector answered with a non-2xx, non-4xx status.
    Server { status: u16, message: String },

    /// The request did not complete within the configured timeout.
    Timeout,

    /// The request failed before a response arrived.
    Network(String),
}

impl std::fmt::Display for TransientReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransientReason::Server { status, message } => {
                write!(f, "server error ({}): {}", status, message)
            }
            TransientReason::Timeout => write!(f, "request timed out"),
            TransientReason::Network(e) => write!(f, "network error: {}", e),
        }
    }
}

/// Outcome of a failed event delivery.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// The collector rejected the event (4xx). Never retried.
    #[error("client error ({status}): {message}")]
    Permanent { status: u16, message: String },

    /// A failure that may succeed on a later attempt.
    #[error("transient delivery failure: {0}")]
    Transient(TransientReason),

    /// The event could not be encoded. Never retried.
    #[error("failed to serialize event: {0}")]
    Serialization(String),
}

impl DeliveryError {
    /// Whether the failure should be retried and, once retries are
    /// exhausted, requeued for a later flush.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DeliveryError::Transient(_))
    }
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, AnalyticsError>;
