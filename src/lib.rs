//! Analytics Batcher Library
//!
//! Client-side batching of analytics events with background delivery:
//!
//! - **config**: Client configuration, defaults, clamping and env loading
//! - **event**: Event records and identities
//! - **queue**: Bounded event queue with drop-oldest overflow
//! - **delivery**: Per-event delivery with retry and exponential backoff
//! - **flusher**: Queue draining in concurrent sub-batches
//! - **transport**: Network seam and the HTTP implementation
//! - **client**: The public [`AnalyticsClient`]
//!
//! # Example
//!
//! ```no_run
//! use analytics_batcher::{AnalyticsClient, ClientConfig, Properties};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ClientConfig {
//!         flush_at: 50,
//!         ..ClientConfig::new("dk_your_api_key")
//!     };
//!     let client = AnalyticsClient::new(config).expect("Failed to create client");
//!
//!     let mut traits = Properties::new();
//!     traits.insert("plan".to_string(), json!("pro"));
//!     client.identify("user_123", traits).ok();
//!
//!     client.track(None, "Page Loaded", Properties::new()).ok();
//!
//!     client.flush().await;
//!     client.close().await;
//! }
//! ```

// Module declarations
pub mod client;
pub mod config;
pub mod delivery;
pub mod error;
pub mod event;
pub mod flusher;
pub mod queue;
pub mod stats;
pub mod transport;

#[cfg(test)]
mod testing;

// Re-export commonly used types at crate root for convenience
pub use client::AnalyticsClient;
pub use config::ClientConfig;
pub use error::{AnalyticsError, ConfigError, DeliveryError, TransientReason};
pub use event::{EventRecord, Identity, Properties};
pub use flusher::FlushReport;
pub use stats::StatsSnapshot;
pub use transport::{DeliveryRequest, HttpTransport, Transport, TransportError, TransportResponse};
