//! Analytics Batcher demo
//!
//! Sends a handful of sample events through the batching client, then
//! flushes and closes it.
//!
//! ## Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! - `ANALYTICS_API_KEY`: Credential sent with every event (required)
//! - `ANALYTICS_HOST`: Collector endpoint (default: https://api.datalyr.com)
//! - `ANALYTICS_FLUSH_AT`: Queue length that triggers a flush (default: 20)
//! - `ANALYTICS_FLUSH_INTERVAL_MS`: Background flush period (default: 10000)
//! - `ANALYTICS_DEBUG`: Per-event diagnostics (default: false)
//! - `RUST_LOG`: Logging level filter (default: info)

use serde_json::{json, Value};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use analytics_batcher::{AnalyticsClient, AnalyticsError, ClientConfig, Properties};

#[tokio::main]
async fn main() {
    // Initialize tracing subscriber with environment filter
    init_tracing();

    info!("Starting analytics demo...");

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            std::process::exit(1);
        }
    };

    let client = match AnalyticsClient::new(config) {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "Failed to create analytics client");
            std::process::exit(1);
        }
    };

    if let Err(e) = send_sample_events(&client) {
        error!(error = %e, "Failed to track sample events");
    }

    if let Some(report) = client.flush().await {
        info!(
            delivered = report.delivered,
            requeued = report.requeued,
            dropped = report.dropped,
            "Flush finished"
        );
    }

    client.close().await;

    let stats = client.stats();
    info!(
        enqueued = stats.enqueued,
        delivered = stats.delivered,
        failed_permanent = stats.failed_permanent,
        retries = stats.retries,
        "Analytics demo finished"
    );
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

/// Track one event of each kind for a sample user.
fn send_sample_events(client: &AnalyticsClient) -> Result<(), AnalyticsError> {
    let user = Some("user_123");

    client.track(
        user,
        "Button Clicked",
        properties(json!({"button_name": "Sign Up", "page": "Homepage"})),
    )?;

    client.identify(
        "user_123",
        properties(json!({"email": "user@example.com", "plan": "free"})),
    )?;

    client.page(
        user,
        Some("Pricing"),
        properties(json!({"url": "https://example.com/pricing"})),
    )?;

    client.group(user, "company_456", Some(properties(json!({"name": "Acme Inc"}))))?;

    client.track(
        None,
        "Purchase Completed",
        properties(json!({
            "amount": 49.99,
            "currency": "USD",
            "items": ["Product A", "Product B"]
        })),
    )?;

    Ok(())
}

fn properties(value: Value) -> Properties {
    match value {
        Value::Object(map) => map,
        _ => Properties::new(),
    }
}
