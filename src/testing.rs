//! Scripted transport for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::transport::{DeliveryRequest, Transport, TransportError, TransportResponse};

/// What the mock does with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MockReply {
    Status(u16),
    NetworkError,
    Hang,
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub at: Instant,
    pub request: DeliveryRequest,
}

impl RecordedCall {
    pub fn event(&self) -> serde_json::Value {
        serde_json::from_slice(&self.request.body).unwrap()
    }
}

pub(crate) struct MockTransport {
    script: Mutex<VecDeque<MockReply>>,
    by_event: HashMap<String, MockReply>,
    fallback: MockReply,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockTransport {
    /// Answer every request the same way.
    pub fn always(reply: MockReply) -> Arc<Self> {
        Self::scripted(Vec::new(), reply)
    }

    /// Answer with `replies` in order, then `fallback` forever.
    pub fn scripted(replies: Vec<MockReply>, fallback: MockReply) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(replies.into()),
            by_event: HashMap::new(),
            fallback,
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Answer by the `event` field of the request body.
    pub fn by_event(replies: &[(&str, MockReply)], fallback: MockReply) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            by_event: replies
                .iter()
                .map(|(name, reply)| (name.to_string(), *reply))
                .collect(),
            fallback,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Event names of every request received, in arrival order.
    pub fn sent_event_names(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|c| c.event()["event"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    fn next_reply(&self, request: &DeliveryRequest) -> MockReply {
        if let Some(reply) = self.script.lock().pop_front() {
            return reply;
        }
        let event: serde_json::Value =
            serde_json::from_slice(&request.body).unwrap_or(serde_json::Value::Null);
        event["event"]
            .as_str()
            .and_then(|name| self.by_event.get(name).copied())
            .unwrap_or(self.fallback)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: DeliveryRequest) -> Result<TransportResponse, TransportError> {
        let reply = self.next_reply(&request);
        self.calls.lock().push(RecordedCall {
            at: Instant::now(),
            request,
        });

        match reply {
            MockReply::Status(status) => Ok(TransportResponse {
                status,
                body: format!("{{\"status\":{}}}", status),
            }),
            MockReply::NetworkError => {
                Err(TransportError::Network("connection refused".to_string()))
            }
            MockReply::Hang => std::future::pending().await,
        }
    }
}
