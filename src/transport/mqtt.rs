//! MQTT platform transport with automatic reconnection
//!
//! A background task drives the `rumqttc` event loop: it dispatches inbound
//! publishes to handlers registered for the exact topic, re-subscribes every
//! known topic on each `ConnAck`, and backs off exponentially on errors.
//! Twin discovery goes over the platform REST API.

use async_trait::async_trait;
use edge_shared::codec;
use parking_lot::Mutex;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::config::EdgeConfig;
use crate::transport::traits::{MessageHandler, PlatformTransport, TransportError, Twin};

/// Capacity of the request channel between client handles and the event loop
const EVENT_CAPACITY: usize = 64;

/// How long `disconnect` waits for the event loop to flush the DISCONNECT packet
const DISCONNECT_GRACE: Duration = Duration::from_secs(2);

type HandlerMap = Arc<Mutex<HashMap<String, Vec<MessageHandler>>>>;

/// Configuration for the MQTT transport
#[derive(Debug, Clone)]
pub struct MqttTransportConfig {
    pub client_id: String,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Platform REST endpoint used for twin discovery
    pub base_url: String,
    pub token: String,
    pub keep_alive: Duration,
    /// How long `connect` waits for the broker's ConnAck
    pub connect_timeout: Duration,
    /// Reconnection delay (initial)
    pub reconnect_delay: Duration,
    /// Maximum reconnection delay
    pub max_reconnect_delay: Duration,
    pub request_timeout: Duration,
}

impl Default for MqttTransportConfig {
    fn default() -> Self {
        Self {
            client_id: "edge-node".into(),
            host: "localhost".into(),
            port: 1883,
            username: None,
            password: None,
            base_url: crate::config::DEFAULT_BASE_URL.into(),
            token: String::new(),
            keep_alive: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(30),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl MqttTransportConfig {
    pub fn from_edge_config(config: &EdgeConfig) -> Self {
        Self {
            client_id: format!("edge-{}", config.edge_uuid),
            host: config.mqtt_host.clone(),
            port: config.mqtt_port,
            username: config.mqtt_username.clone(),
            password: config.mqtt_password.clone(),
            base_url: config.base_url.clone(),
            token: config.token.clone(),
            ..Default::default()
        }
    }

    fn mqtt_options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(self.keep_alive);
        options.set_clean_session(true);
        if let Some(username) = &self.username {
            options.set_credentials(username, self.password.clone().unwrap_or_default());
        }
        options
    }
}

#[derive(Debug, Deserialize)]
struct EdgeResponse {
    #[serde(default)]
    twins: Vec<Twin>,
}

/// Platform transport over an MQTT broker
pub struct MqttTransport {
    config: MqttTransportConfig,
    http: reqwest::Client,
    client: Mutex<Option<AsyncClient>>,
    handlers: HandlerMap,
    connected: Arc<AtomicBool>,
    event_task: Mutex<Option<JoinHandle<()>>>,
}

impl MqttTransport {
    pub fn new(config: MqttTransportConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build HTTP client ({}), using defaults", e);
                reqwest::Client::new()
            });

        Self {
            config,
            http,
            client: Mutex::new(None),
            handlers: Arc::new(Mutex::new(HashMap::new())),
            connected: Arc::new(AtomicBool::new(false)),
            event_task: Mutex::new(None),
        }
    }

    pub fn from_edge_config(config: &EdgeConfig) -> Self {
        Self::new(MqttTransportConfig::from_edge_config(config))
    }

    /// Drop the client and stop the event loop without a clean DISCONNECT
    fn teardown(&self) {
        self.client.lock().take();
        if let Some(handle) = self.event_task.lock().take() {
            handle.abort();
        }
        self.connected.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl PlatformTransport for MqttTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        if self.is_connected() {
            return Ok(());
        }

        let (client, eventloop) = AsyncClient::new(self.config.mqtt_options(), EVENT_CAPACITY);
        let (ready_tx, ready_rx) = oneshot::channel();

        let handle = tokio::spawn(event_loop(
            eventloop,
            client.clone(),
            self.handlers.clone(),
            self.connected.clone(),
            (self.config.reconnect_delay, self.config.max_reconnect_delay),
            ready_tx,
        ));
        if let Some(previous) = self.event_task.lock().replace(handle) {
            previous.abort();
        }
        *self.client.lock() = Some(client);

        match timeout(self.config.connect_timeout, ready_rx).await {
            Ok(Ok(())) => {
                info!(
                    "Connected to MQTT broker {}:{} as {}",
                    self.config.host, self.config.port, self.config.client_id
                );
                Ok(())
            }
            Ok(Err(_)) => {
                self.teardown();
                Err(TransportError::Connection("MQTT event loop stopped before ConnAck".into()))
            }
            Err(_) => {
                self.teardown();
                Err(TransportError::Connection(format!(
                    "no ConnAck from {}:{} within {:?}",
                    self.config.host, self.config.port, self.config.connect_timeout
                )))
            }
        }
    }

    async fn disconnect(&self) {
        let client = self.client.lock().take();
        let handle = self.event_task.lock().take();

        if let Some(client) = client {
            if let Err(e) = client.disconnect().await {
                debug!("MQTT disconnect request failed: {}", e);
            }
        }
        if let Some(mut handle) = handle {
            if timeout(DISCONNECT_GRACE, &mut handle).await.is_err() {
                handle.abort();
            }
        }

        self.connected.store(false, Ordering::SeqCst);
        info!("Disconnected from MQTT broker");
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn publish(&self, topic: &str, payload: Value) -> Result<(), TransportError> {
        let client = self.client.lock().clone().ok_or(TransportError::NotConnected)?;
        let encoded = codec::encode(&payload)?;

        client
            .publish_bytes(topic, QoS::AtLeastOnce, false, encoded)
            .await
            .map_err(|e| TransportError::Publish(e.to_string()))
    }

    async fn subscribe(&self, topic: &str, handler: MessageHandler) -> Result<(), TransportError> {
        self.handlers
            .lock()
            .entry(topic.to_string())
            .or_default()
            .push(handler);

        // Not connected yet: the ConnAck handler subscribes every registered topic
        let client = self.client.lock().clone();
        if let Some(client) = client.filter(|_| self.is_connected()) {
            client
                .subscribe(topic, QoS::AtLeastOnce)
                .await
                .map_err(|e| TransportError::Subscribe(e.to_string()))?;
        }

        debug!("Subscribed to {}", topic);
        Ok(())
    }

    async fn fetch_twins(&self, edge_uuid: &str) -> Result<Vec<Twin>, TransportError> {
        let url = format!(
            "{}/api/v1/edges/{}",
            self.config.base_url.trim_end_matches('/'),
            edge_uuid
        );

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.config.token)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let edge: EdgeResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        Ok(edge.twins)
    }

    fn name(&self) -> &'static str {
        "mqtt"
    }
}

/// Drive the MQTT event loop until a DISCONNECT goes out
async fn event_loop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    handlers: HandlerMap,
    connected: Arc<AtomicBool>,
    (initial_delay, max_delay): (Duration, Duration),
    ready: oneshot::Sender<()>,
) {
    let mut ready = Some(ready);
    let mut retry_delay = initial_delay;

    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                connected.store(true, Ordering::SeqCst);
                retry_delay = initial_delay;
                resubscribe(&client, &handlers);
                if let Some(tx) = ready.take() {
                    let _ = tx.send(());
                }
                debug!("MQTT session established ({:?})", ack.code);
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                dispatch(&handlers, &publish.topic, &publish.payload);
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                connected.store(false, Ordering::SeqCst);
                break;
            }
            Ok(_) => {}
            Err(e) => {
                if connected.swap(false, Ordering::SeqCst) {
                    warn!("MQTT connection lost: {}", e);
                }
                debug!("MQTT retry in {:?}: {}", retry_delay, e);
                sleep(retry_delay).await;

                // Exponential backoff
                retry_delay = std::cmp::min(retry_delay * 2, max_delay);
            }
        }
    }

    debug!("MQTT event loop stopped");
}

fn resubscribe(client: &AsyncClient, handlers: &HandlerMap) {
    let topics: Vec<String> = handlers.lock().keys().cloned().collect();
    for topic in topics {
        // try_subscribe never waits on the event loop we are running inside
        if let Err(e) = client.try_subscribe(topic.clone(), QoS::AtLeastOnce) {
            warn!("Resubscribe to {} failed: {}", topic, e);
        }
    }
}

/// Decode a payload and hand it to every handler registered for `topic`
fn dispatch(handlers: &HandlerMap, topic: &str, payload: &[u8]) -> usize {
    let targets = handlers.lock().get(topic).cloned().unwrap_or_default();
    if targets.is_empty() {
        debug!("No handler for {}", topic);
        return 0;
    }

    let value: Value = match codec::decode(payload) {
        Ok(value) => value,
        Err(e) => {
            warn!("Dropping undecodable message on {}: {}", topic, e);
            return 0;
        }
    };

    for handler in &targets {
        handler(value.clone());
    }
    targets.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recording_handler(sink: Arc<Mutex<Vec<Value>>>) -> MessageHandler {
        Arc::new(move |payload| sink.lock().push(payload))
    }

    #[test]
    fn test_edge_response_tolerates_null_twin_uuid() {
        let body = json!({"twins": [{"uuid": null, "name": "a"}, {"uuid": "T2", "name": "b"}, {"name": "c"}]});
        let response: EdgeResponse = serde_json::from_value(body).unwrap();

        assert_eq!(response.twins.len(), 3);
        assert_eq!(response.twins[0].uuid, "");
        assert_eq!(response.twins[1], Twin::new("T2", "b"));
        assert_eq!(response.twins[2].uuid, "");
    }

    #[test]
    fn test_config_from_edge_config() {
        let edge = EdgeConfig {
            edge_uuid: "edge-1".into(),
            mqtt_host: "broker.local".into(),
            mqtt_port: 8883,
            mqtt_username: Some("user".into()),
            token: "secret".into(),
            ..Default::default()
        };

        let config = MqttTransportConfig::from_edge_config(&edge);
        assert_eq!(config.client_id, "edge-edge-1");
        assert_eq!(config.host, "broker.local");
        assert_eq!(config.port, 8883);
        assert_eq!(config.token, "secret");

        let options = config.mqtt_options();
        assert_eq!(options.broker_address(), ("broker.local".to_string(), 8883));
        assert_eq!(options.client_id(), "edge-edge-1");
    }

    #[test]
    fn test_dispatch_exact_topic() {
        let handlers: HandlerMap = Arc::new(Mutex::new(HashMap::new()));
        let seen = Arc::new(Mutex::new(Vec::new()));
        handlers
            .lock()
            .entry("cyberwave/twin/T1/navigate/command".into())
            .or_default()
            .push(recording_handler(seen.clone()));

        let delivered = dispatch(&handlers, "cyberwave/twin/T1/navigate/command", br#"{"command":"stop"}"#);
        assert_eq!(delivered, 1);
        assert_eq!(dispatch(&handlers, "cyberwave/twin/T2/navigate/command", b"{}"), 0);
        assert_eq!(*seen.lock(), vec![json!({"command": "stop"})]);
    }

    #[test]
    fn test_dispatch_drops_invalid_json() {
        let handlers: HandlerMap = Arc::new(Mutex::new(HashMap::new()));
        let seen = Arc::new(Mutex::new(Vec::new()));
        handlers.lock().entry("t".into()).or_default().push(recording_handler(seen.clone()));

        assert_eq!(dispatch(&handlers, "t", b"not json"), 0);
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_publish_before_connect() {
        let transport = MqttTransport::new(MqttTransportConfig::default());
        assert!(!transport.is_connected());

        let result = transport.publish("t", json!({})).await;
        assert!(matches!(result, Err(TransportError::NotConnected)));
    }

    #[tokio::test]
    async fn test_subscribe_before_connect_is_deferred() {
        let transport = MqttTransport::new(MqttTransportConfig::default());
        let seen = Arc::new(Mutex::new(Vec::new()));

        transport.subscribe("a", recording_handler(seen.clone())).await.unwrap();
        transport.subscribe("a", recording_handler(seen.clone())).await.unwrap();

        assert_eq!(dispatch(&transport.handlers, "a", b"1"), 2);
        assert_eq!(seen.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_disconnect_when_never_connected() {
        let transport = MqttTransport::new(MqttTransportConfig::default());
        transport.disconnect().await;
        assert!(!transport.is_connected());
    }
}
