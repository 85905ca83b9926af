//! Event records and the identity attached to them.
//!
//! An [`EventRecord`] is built once by the client and never mutated after it
//! is queued. It carries exactly one identity: the caller's user id, or a
//! locally generated anonymous id when no user id was given.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AnalyticsError;

/// Arbitrary event properties.
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// Library name reported in every event's context.
const LIBRARY_NAME: &str = env!("CARGO_PKG_NAME");

/// Library version reported in every event's context.
const LIBRARY_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Source tag for server-side events.
const EVENT_SOURCE: &str = "api";

/// Prefix of generated anonymous identifiers.
const ANONYMOUS_ID_PREFIX: &str = "anon_";

/// Who an event is about.
///
/// Serialized flattened into the record as either `userId` or `anonymousId`,
/// so a record can never carry both or neither.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Identity {
    /// A caller-supplied, known user.
    #[serde(rename = "userId")]
    User(String),

    /// A generated stand-in identity.
    #[serde(rename = "anonymousId")]
    Anonymous(String),
}

impl Identity {
    /// Resolve an optional subject id, generating an anonymous id when the
    /// subject is absent or empty.
    pub fn resolve(subject_id: Option<&str>) -> Self {
        match subject_id {
            Some(id) if !id.is_empty() => Identity::User(id.to_string()),
            _ => Identity::Anonymous(generate_anonymous_id()),
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Identity::User(id) => Some(id),
            Identity::Anonymous(_) => None,
        }
    }

    pub fn anonymous_id(&self) -> Option<&str> {
        match self {
            Identity::User(_) => None,
            Identity::Anonymous(id) => Some(id),
        }
    }
}

/// Library metadata attached to every event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventContext {
    pub library: String,
    pub version: String,
    pub source: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self {
            library: LIBRARY_NAME.to_string(),
            version: LIBRARY_VERSION.to_string(),
            source: EVENT_SOURCE.to_string(),
        }
    }
}

/// A single tracked occurrence, as sent to the collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    /// Unique per record, lets the collector deduplicate redeliveries
    pub message_id: Uuid,

    /// User id or anonymous id
    #[serde(flatten)]
    pub identity: Identity,

    /// Event type
    pub event: String,

    /// Caller-supplied properties
    #[serde(default)]
    pub properties: Properties,

    /// Library metadata
    pub context: EventContext,

    /// Capture time
    pub timestamp: DateTime<Utc>,
}

impl EventRecord {
    /// Create a new record captured now.
    ///
    /// # Errors
    ///
    /// Returns `AnalyticsError::Validation` if `event` is empty.
    pub fn new(
        subject_id: Option<&str>,
        event: &str,
        properties: Properties,
    ) -> Result<Self, AnalyticsError> {
        if event.trim().is_empty() {
            return Err(AnalyticsError::Validation(
                "event name is required and must be a non-empty string".to_string(),
            ));
        }

        Ok(Self {
            message_id: Uuid::new_v4(),
            identity: Identity::resolve(subject_id),
            event: event.to_string(),
            properties,
            context: EventContext::default(),
            timestamp: Utc::now(),
        })
    }
}

/// Generate an anonymous identifier: a random component followed by a
/// millisecond timestamp, both base36.
///
/// Unique enough for session-scoped deduplication; not cryptographically
/// secure.
pub fn generate_anonymous_id() -> String {
    let random: u64 = rand::thread_rng().gen();
    let millis = Utc::now().timestamp_millis().max(0) as u64;
    format!(
        "{}{}{}",
        ANONYMOUS_ID_PREFIX,
        to_base36(random),
        to_base36(millis)
    )
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    if value == 0 {
        return "0".to_string();
    }

    let mut digits = Vec::new();
    while value > 0 {
        digits.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}
