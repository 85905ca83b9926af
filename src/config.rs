//! Configuration module for the analytics client.
//!
//! A [`ClientConfig`] can be built in code (from a bare API key or field by
//! field) or loaded from environment variables. Numeric options are clamped
//! into safe ranges once, when the client is constructed.

use std::env;
use std::time::Duration;

use tracing::warn;

use crate::error::ConfigError;

/// Default collector endpoint.
pub const DEFAULT_HOST: &str = "https://api.datalyr.com";

/// Default number of queued events that triggers an automatic flush.
const DEFAULT_FLUSH_AT: usize = 20;

/// Default interval between background flushes.
const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(10_000);

/// Default per-request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Default number of in-place retries per event.
const DEFAULT_RETRY_LIMIT: u32 = 3;

/// Default queue capacity.
const DEFAULT_MAX_QUEUE_SIZE: usize = 1000;

const MIN_FLUSH_AT: usize = 1;
const MAX_FLUSH_AT: usize = 100;

const MIN_TIMEOUT: Duration = Duration::from_millis(1_000);
const MAX_TIMEOUT: Duration = Duration::from_millis(60_000);

const MIN_QUEUE_SIZE: usize = 100;
const MAX_QUEUE_SIZE: usize = 10_000;

/// Prefix expected on API keys. Checked for a warning only.
const API_KEY_PREFIX: &str = "dk_";

/// Configuration for the analytics client.
///
/// Settings can also be loaded from environment variables, see
/// [`ClientConfig::from_env`]:
/// - `ANALYTICS_API_KEY` (required)
/// - `ANALYTICS_HOST` (default: https://api.datalyr.com)
/// - `ANALYTICS_FLUSH_AT` (default: 20)
/// - `ANALYTICS_FLUSH_INTERVAL_MS` (default: 10000)
/// - `ANALYTICS_DEBUG` (default: false)
/// - `ANALYTICS_TIMEOUT_MS` (default: 10000)
/// - `ANALYTICS_RETRY_LIMIT` (default: 3)
/// - `ANALYTICS_MAX_QUEUE_SIZE` (default: 1000)
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Credential attached to every request
    pub api_key: String,

    /// Collector endpoint events are POSTed to
    pub host: String,

    /// Queue length that triggers an automatic flush
    pub flush_at: usize,

    /// Period of the background flush timer
    pub flush_interval: Duration,

    /// Emit per-event diagnostics
    pub debug: bool,

    /// Per-request timeout
    pub timeout: Duration,

    /// Number of in-place retries for a transient delivery failure
    pub retry_limit: u32,

    /// Maximum number of events held in the queue
    pub max_queue_size: usize,
}

impl ClientConfig {
    /// Create a configuration with the given API key and default settings.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            host: DEFAULT_HOST.to_string(),
            flush_at: DEFAULT_FLUSH_AT,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            debug: false,
            timeout: DEFAULT_TIMEOUT,
            retry_limit: DEFAULT_RETRY_LIMIT,
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Out-of-range numbers are accepted here and clamped later by
    /// [`ClientConfig::normalized`].
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - `ANALYTICS_API_KEY` is not set
    /// - any numeric variable is not a valid number
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use analytics_batcher::config::ClientConfig;
    ///
    /// let config = ClientConfig::from_env().expect("Failed to load config");
    /// println!("Host: {}", config.host);
    /// ```
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = env::var("ANALYTICS_API_KEY").map_err(|_| ConfigError::MissingApiKey)?;
        let mut config = Self::new(api_key);

        if let Ok(host) = env::var("ANALYTICS_HOST") {
            config.host = host;
        }
        if let Some(flush_at) = parse_env::<usize>("ANALYTICS_FLUSH_AT")? {
            config.flush_at = flush_at;
        }
        if let Some(ms) = parse_env::<u64>("ANALYTICS_FLUSH_INTERVAL_MS")? {
            config.flush_interval = Duration::from_millis(ms);
        }
        if let Some(debug) = parse_env::<bool>("ANALYTICS_DEBUG")? {
            config.debug = debug;
        }
        if let Some(ms) = parse_env::<u64>("ANALYTICS_TIMEOUT_MS")? {
            config.timeout = Duration::from_millis(ms);
        }
        if let Some(retry_limit) = parse_env::<u32>("ANALYTICS_RETRY_LIMIT")? {
            config.retry_limit = retry_limit;
        }
        if let Some(size) = parse_env::<usize>("ANALYTICS_MAX_QUEUE_SIZE")? {
            config.max_queue_size = size;
        }

        Ok(config)
    }

    /// Validate the configuration and clamp numeric options into range.
    ///
    /// Out-of-range values are coerced to the nearest bound rather than
    /// rejected. A key without the `dk_` prefix only produces a warning.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingApiKey` if the API key is blank.
    pub fn normalized(mut self) -> Result<Self, ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }

        if !self.api_key.starts_with(API_KEY_PREFIX) {
            warn!(
                expected_prefix = API_KEY_PREFIX,
                "API key does not use the expected prefix"
            );
        }

        if self.host.trim().is_empty() {
            self.host = DEFAULT_HOST.to_string();
        }

        self.flush_at = self.flush_at.clamp(MIN_FLUSH_AT, MAX_FLUSH_AT);
        self.timeout = self.timeout.clamp(MIN_TIMEOUT, MAX_TIMEOUT);
        self.max_queue_size = self.max_queue_size.clamp(MIN_QUEUE_SIZE, MAX_QUEUE_SIZE);

        // tokio intervals cannot tick with a zero period
        if self.flush_interval.is_zero() {
            self.flush_interval = DEFAULT_FLUSH_INTERVAL;
        }

        Ok(self)
    }
}

impl From<&str> for ClientConfig {
    fn from(api_key: &str) -> Self {
        Self::new(api_key)
    }
}

impl From<String> for ClientConfig {
    fn from(api_key: String) -> Self {
        Self::new(api_key)
    }
}

/// Parse an optional environment variable, naming the variable on failure.
fn parse_env<T: std::str::FromStr>(env_var: &str) -> Result<Option<T>, ConfigError> {
    match env::var(env_var) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                env_var: env_var.to_string(),
                message: format!("'{}' is not a valid value", value),
            }),
        Err(_) => Ok(None),
    }
}
