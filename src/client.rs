//! Public analytics client.
//!
//! [`AnalyticsClient`] validates input, builds event records and queues
//! them. Delivery happens in the background: a flush is started whenever
//! the queue reaches `flush_at` events and on every `flush_interval` tick.
//! Producers are never blocked or failed by delivery problems.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::delivery::Deliverer;
use crate::error::{AnalyticsError, ConfigError, Result};
use crate::event::{EventRecord, Properties};
use crate::flusher::{BatchFlusher, FlushReport};
use crate::queue::EventQueue;
use crate::stats::{ClientStats, StatsSnapshot};
use crate::transport::{HttpTransport, Transport};

/// Upper bound on the final flush performed by [`AnalyticsClient::close`].
pub const CLOSE_DEADLINE: Duration = Duration::from_secs(5);

/// Reserved event name for `identify`.
pub const IDENTIFY_EVENT: &str = "$identify";

/// Reserved event name for `page`.
pub const PAGEVIEW_EVENT: &str = "$pageview";

/// Reserved event name for `group`.
pub const GROUP_EVENT: &str = "$group";

/// State shared between the client, the background timer and detached
/// flush tasks.
struct ClientInner {
    config: ClientConfig,
    queue: Arc<EventQueue>,
    flusher: BatchFlusher,
    closing: AtomicBool,
    stats: Arc<ClientStats>,
}

impl ClientInner {
    /// Queue a record, returning the new queue length, or `None` if the
    /// queue was closed in the meantime and the record was dropped.
    fn enqueue(&self, record: EventRecord) -> Option<usize> {
        let event = self.config.debug.then(|| record.event.clone());
        let outcome = self.queue.enqueue(record);

        if !outcome.accepted {
            self.record_dropped_closing(event.as_deref());
            return None;
        }

        self.stats.record_enqueued();
        if outcome.evicted.is_some() {
            self.stats.record_dropped_overflow();
        }

        if let Some(event) = event {
            debug!(event = %event, queue_len = outcome.len, "Event queued");
        }

        Some(outcome.len)
    }

    fn record_dropped_closing(&self, event: Option<&str>) {
        self.stats.record_dropped_closing();
        if let Some(event) = event {
            debug!(event = %event, "Client is closing, event dropped");
        }
    }
}

/// Client for tracking analytics events.
///
/// Must be created from within a tokio runtime; the background flush timer
/// and automatic flushes run as tasks on that runtime.
///
/// # Example
///
/// ```no_run
/// use analytics_batcher::{AnalyticsClient, Properties};
/// use serde_json::json;
///
/// #[tokio::main]
/// async fn main() -> Result<(), analytics_batcher::AnalyticsError> {
///     let client = AnalyticsClient::new("dk_your_api_key")?;
///
///     let mut properties = Properties::new();
///     properties.insert("button_name".to_string(), json!("Sign Up"));
///     client.track(Some("user_123"), "Button Clicked", properties)?;
///
///     client.close().await;
///     Ok(())
/// }
/// ```
pub struct AnalyticsClient {
    inner: Arc<ClientInner>,
    runtime: Handle,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl AnalyticsClient {
    /// Create a client from a bare API key or a full configuration, sending
    /// over HTTP.
    ///
    /// # Errors
    ///
    /// Returns `AnalyticsError::Config` if the API key is missing, if called
    /// outside a tokio runtime, or if the HTTP client cannot be built.
    pub fn new(config: impl Into<ClientConfig>) -> Result<Self> {
        let config = config.into().normalized()?;
        let transport = Arc::new(HttpTransport::new(config.timeout)?);
        Self::build(config, transport)
    }

    /// Create a client that delivers through the given transport.
    ///
    /// # Errors
    ///
    /// Returns `AnalyticsError::Config` if the API key is missing or if
    /// called outside a tokio runtime.
    pub fn with_transport(
        config: impl Into<ClientConfig>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let config = config.into().normalized()?;
        Self::build(config, transport)
    }

    fn build(config: ClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| ConfigError::NoRuntime)?;

        let stats = Arc::new(ClientStats::default());
        let queue = Arc::new(EventQueue::new(config.max_queue_size));
        let deliverer = Deliverer::new(&config, transport, stats.clone());
        let flusher = BatchFlusher::new(queue.clone(), deliverer, stats.clone(), config.debug);

        let inner = Arc::new(ClientInner {
            config,
            queue,
            flusher,
            closing: AtomicBool::new(false),
            stats,
        });

        let timer = runtime.spawn(run_flush_timer(
            Arc::downgrade(&inner),
            inner.config.flush_interval,
        ));

        info!(
            host = %inner.config.host,
            flush_at = inner.config.flush_at,
            flush_interval_ms = inner.config.flush_interval.as_millis() as u64,
            max_queue_size = inner.config.max_queue_size,
            "Analytics client initialized"
        );

        Ok(Self {
            inner,
            runtime,
            timer: Mutex::new(Some(timer)),
        })
    }

    /// Track an event.
    ///
    /// Without a `subject_id` the event is attributed to a freshly generated
    /// anonymous id. Once the queue reaches `flush_at` events a flush is
    /// started in the background; its outcome is only logged.
    ///
    /// Events tracked after [`close`](Self::close) are silently dropped.
    ///
    /// # Errors
    ///
    /// Returns `AnalyticsError::Validation` if `event` is empty.
    pub fn track(
        &self,
        subject_id: Option<&str>,
        event: &str,
        properties: Properties,
    ) -> Result<()> {
        if self.inner.closing.load(Ordering::Acquire) {
            let event = self.inner.config.debug.then_some(event);
            self.inner.record_dropped_closing(event);
            return Ok(());
        }

        let record = EventRecord::new(subject_id, event, properties)?;
        let Some(queue_len) = self.inner.enqueue(record) else {
            return Ok(());
        };

        if queue_len >= self.inner.config.flush_at {
            self.spawn_flush("threshold");
        }

        Ok(())
    }

    /// Attach traits to a known user.
    ///
    /// Tracked as `$identify` with the traits under `$set`.
    ///
    /// # Errors
    ///
    /// Returns `AnalyticsError::Validation` if `subject_id` is empty.
    pub fn identify(&self, subject_id: &str, traits: Properties) -> Result<()> {
        if subject_id.is_empty() {
            return Err(AnalyticsError::Validation(
                "subject id is required for identify".to_string(),
            ));
        }

        let mut properties = Properties::new();
        properties.insert("$set".to_string(), Value::Object(traits));
        self.track(Some(subject_id), IDENTIFY_EVENT, properties)
    }

    /// Record a page view.
    ///
    /// Tracked as `$pageview`. `name` is merged into the properties; a
    /// `name` key in `properties` takes precedence.
    pub fn page(
        &self,
        subject_id: Option<&str>,
        name: Option<&str>,
        properties: Properties,
    ) -> Result<()> {
        let mut merged = Properties::new();
        if let Some(name) = name {
            merged.insert("name".to_string(), Value::String(name.to_string()));
        }
        merged.extend(properties);
        self.track(subject_id, PAGEVIEW_EVENT, merged)
    }

    /// Associate a user with a group.
    ///
    /// Tracked as `$group` with properties `{groupId, traits}`.
    ///
    /// # Errors
    ///
    /// Returns `AnalyticsError::Validation` if `group_id` is empty.
    pub fn group(
        &self,
        subject_id: Option<&str>,
        group_id: &str,
        traits: Option<Properties>,
    ) -> Result<()> {
        if group_id.is_empty() {
            return Err(AnalyticsError::Validation(
                "group id is required for group".to_string(),
            ));
        }

        let mut properties = Properties::new();
        properties.insert("groupId".to_string(), Value::String(group_id.to_string()));
        if let Some(traits) = traits {
            properties.insert("traits".to_string(), Value::Object(traits));
        }
        self.track(subject_id, GROUP_EVENT, properties)
    }

    /// Flush queued events now and wait for the flush to finish.
    ///
    /// Returns `None` if there was nothing to flush or another flush was
    /// already running. Delivery failures never produce an error: failed
    /// events are requeued or dropped, as reported.
    pub async fn flush(&self) -> Option<FlushReport> {
        self.inner.flusher.flush().await
    }

    /// Stop accepting events, stop the timer and make one final flush.
    ///
    /// The final flush is bounded by [`CLOSE_DEADLINE`]; if it has not
    /// finished by then it is abandoned and left running unobserved. Safe to
    /// call more than once.
    pub async fn close(&self) {
        let already_closed = self.inner.closing.swap(true, Ordering::AcqRel);
        self.inner.queue.close();

        if let Some(timer) = self.timer.lock().take() {
            timer.abort();
            debug!("Flush timer stopped");
        }

        let inner = self.inner.clone();
        let final_flush = self.runtime.spawn(async move { inner.flusher.flush().await });

        if tokio::time::timeout(CLOSE_DEADLINE, final_flush).await.is_err() {
            debug!(
                deadline_secs = CLOSE_DEADLINE.as_secs(),
                "Final flush did not finish before the close deadline"
            );
        }

        let remaining = self.inner.queue.len();
        if remaining > 0 {
            debug!(remaining = remaining, "Closing with events still queued");
        }

        if !already_closed {
            info!("Analytics client closed");
        }
    }

    /// Get the current number of queued events.
    pub fn queue_len(&self) -> usize {
        self.inner.queue.len()
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.closing.load(Ordering::Acquire)
    }

    /// Get a snapshot of the client's counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Get the effective (normalized) configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Start a flush without waiting for it.
    fn spawn_flush(&self, trigger: &'static str) {
        let inner = self.inner.clone();
        self.runtime.spawn(async move {
            if let Some(report) = inner.flusher.flush().await {
                if report.requeued + report.dropped > 0 {
                    debug!(
                        trigger = trigger,
                        delivered = report.delivered,
                        requeued = report.requeued,
                        dropped = report.dropped,
                        "Auto-flush finished with failures"
                    );
                }
            }
        });
    }
}

impl Drop for AnalyticsClient {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.get_mut().take() {
            timer.abort();
        }
    }
}

/// Periodically flush until the client goes away or starts closing.
///
/// Holds only a weak reference so the timer never keeps the client alive.
async fn run_flush_timer(inner: Weak<ClientInner>, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // Skip the first immediate tick
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let Some(client) = inner.upgrade() else {
            break;
        };

        if client.closing.load(Ordering::Acquire) {
            break;
        }

        if let Some(report) = client.flusher.flush().await {
            if report.requeued + report.dropped > 0 {
                debug!(
                    trigger = "timer",
                    delivered = report.delivered,
                    requeued = report.requeued,
                    dropped = report.dropped,
                    "Timer flush finished with failures"
                );
            }
        }
    }
}
