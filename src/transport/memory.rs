//! In-process transport
//!
//! Records every publish and lets callers inject inbound messages. Used by the
//! test suite and for running a node without a broker.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::debug;

use crate::transport::traits::{MessageHandler, PlatformTransport, TransportError, Twin};

/// A message captured by [`MemoryTransport::publish`]
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Value,
}

#[derive(Default)]
pub struct MemoryTransport {
    connected: AtomicBool,
    fail_connect: AtomicBool,
    fail_discovery: AtomicBool,
    fail_publish: AtomicBool,
    connect_calls: AtomicUsize,
    twins: Mutex<Vec<Twin>>,
    published: Mutex<Vec<PublishedMessage>>,
    handlers: Mutex<HashMap<String, Vec<MessageHandler>>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport whose discovery query returns `twins`
    pub fn with_twins(twins: Vec<Twin>) -> Self {
        let transport = Self::default();
        *transport.twins.lock() = twins;
        transport
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_discovery(&self, fail: bool) {
        self.fail_discovery.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    /// Everything published so far, oldest first
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().clone()
    }

    /// Payloads published on exactly `topic`
    pub fn published_on(&self, topic: &str) -> Vec<Value> {
        self.published
            .lock()
            .iter()
            .filter(|m| m.topic == topic)
            .map(|m| m.payload.clone())
            .collect()
    }

    /// Topics with at least one registered handler
    pub fn subscriptions(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.handlers.lock().keys().cloned().collect();
        topics.sort();
        topics
    }

    /// Simulate an inbound message, returning the number of handlers invoked
    pub fn deliver(&self, topic: &str, payload: Value) -> usize {
        let handlers = self.handlers.lock().get(topic).cloned().unwrap_or_default();
        for handler in &handlers {
            handler(payload.clone());
        }
        handlers.len()
    }
}

#[async_trait]
impl PlatformTransport for MemoryTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(TransportError::Connection("memory transport refused connection".into()));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn publish(&self, topic: &str, payload: Value) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(TransportError::Publish(format!("memory transport dropped {}", topic)));
        }
        debug!("[MEMORY] Published to {}", topic);
        self.published.lock().push(PublishedMessage {
            topic: topic.to_string(),
            payload,
        });
        Ok(())
    }

    async fn subscribe(&self, topic: &str, handler: MessageHandler) -> Result<(), TransportError> {
        self.handlers
            .lock()
            .entry(topic.to_string())
            .or_default()
            .push(handler);
        Ok(())
    }

    async fn fetch_twins(&self, _edge_uuid: &str) -> Result<Vec<Twin>, TransportError> {
        if self.fail_discovery.load(Ordering::SeqCst) {
            return Err(TransportError::Request("memory transport discovery failure".into()));
        }
        Ok(self.twins.lock().clone())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_publish_requires_connection() {
        let transport = MemoryTransport::new();
        let result = transport.publish("a/b", json!({})).await;
        assert!(matches!(result, Err(TransportError::NotConnected)));

        transport.connect().await.unwrap();
        transport.publish("a/b", json!({"n": 1})).await.unwrap();
        assert_eq!(transport.published_on("a/b"), vec![json!({"n": 1})]);
    }

    #[tokio::test]
    async fn test_deliver_to_subscribers() {
        let transport = MemoryTransport::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        transport
            .subscribe("cmd", Arc::new(move |payload| sink.lock().push(payload)))
            .await
            .unwrap();

        assert_eq!(transport.deliver("cmd", json!({"command": "stop"})), 1);
        assert_eq!(transport.deliver("other", json!({})), 0);
        assert_eq!(*seen.lock(), vec![json!({"command": "stop"})]);
    }

    #[tokio::test]
    async fn test_discovery_failure() {
        let transport = MemoryTransport::with_twins(vec![Twin::new("T1", "robot")]);
        assert_eq!(transport.fetch_twins("edge").await.unwrap().len(), 1);

        transport.set_fail_discovery(true);
        assert!(transport.fetch_twins("edge").await.is_err());
    }
}
