//! Transport trait abstraction for the platform connection

use async_trait::async_trait;
use edge_shared::codec::CodecError;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by platform transports
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Transport not connected")]
    NotConnected,

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Subscribe failed: {0}")]
    Subscribe(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}

/// Callback invoked with the decoded payload of every message on a topic.
///
/// Runs on the transport's receive task, so it must not block.
pub type MessageHandler = Arc<dyn Fn(Value) + Send + Sync>;

/// Platform-side counterpart of a physical device
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Twin {
    /// Empty when the platform sent no usable identifier
    #[serde(default, deserialize_with = "null_as_empty")]
    pub uuid: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl Twin {
    pub fn new(uuid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            name: Some(name.into()),
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Publish/subscribe plus REST access to the platform
#[async_trait]
pub trait PlatformTransport: Send + Sync {
    /// Open the connection
    async fn connect(&self) -> Result<(), TransportError>;

    /// Close the connection; safe to call when not connected
    async fn disconnect(&self);

    fn is_connected(&self) -> bool;

    /// Publish a JSON payload on `topic`
    async fn publish(&self, topic: &str, payload: Value) -> Result<(), TransportError>;

    /// Register `handler` for every message arriving on `topic`
    async fn subscribe(&self, topic: &str, handler: MessageHandler) -> Result<(), TransportError>;

    /// Twins paired to the given edge device
    async fn fetch_twins(&self, edge_uuid: &str) -> Result<Vec<Twin>, TransportError>;

    /// Human-readable name for this transport
    fn name(&self) -> &'static str;
}
