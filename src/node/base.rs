//! Shared state and platform helpers of every edge node

use edge_shared::messages::{
    health_message, EventMessage, JointStatesMessage, MapUpdateMessage, MissionStatusMessage,
    NavStatusMessage, PositionMessage, RotationMessage, TelemetryMessage,
};
use edge_shared::topics::{suffix, TopicScheme};
use edge_shared::{NavigationStatus, Quaternion, Vector3};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::EdgeConfig;
use crate::transport::{MessageHandler, PlatformTransport, TransportError, Twin};

/// Lifecycle flags, twin registry and publish/subscribe helpers
pub struct NodeCore {
    config: EdgeConfig,
    transport: Arc<dyn PlatformTransport>,
    topics: TopicScheme,
    running: AtomicBool,
    shutdown_started: AtomicBool,
    shutdown_notify: Notify,
    started_at: Mutex<Option<Instant>>,
    twins: OnceLock<Vec<Twin>>,
    health_task: Mutex<Option<JoinHandle<()>>>,
}

impl NodeCore {
    pub fn new(config: EdgeConfig, transport: Arc<dyn PlatformTransport>) -> Self {
        let topics = TopicScheme::new(config.topic_prefix.clone());
        Self {
            config,
            transport,
            topics,
            running: AtomicBool::new(false),
            shutdown_started: AtomicBool::new(false),
            shutdown_notify: Notify::new(),
            started_at: Mutex::new(None),
            twins: OnceLock::new(),
            health_task: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &EdgeConfig {
        &self.config
    }

    pub fn transport(&self) -> &Arc<dyn PlatformTransport> {
        &self.transport
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Ask the main loop to exit; `run` then performs the full shutdown
    pub fn request_shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.shutdown_notify.notify_waiters();
    }

    /// Seconds since `run` started, zero before that
    pub fn uptime(&self) -> f64 {
        self.started_at
            .lock()
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    pub(crate) fn mark_started(&self) {
        *self.started_at.lock() = Some(Instant::now());
        self.running.store(true, Ordering::SeqCst);
    }

    /// First caller wins; later callers get `false`
    pub(crate) fn begin_shutdown(&self) -> bool {
        !self.shutdown_started.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn set_health_task(&self, handle: JoinHandle<()>) {
        if let Some(previous) = self.health_task.lock().replace(handle) {
            previous.abort();
        }
    }

    pub(crate) fn take_health_task(&self) -> Option<JoinHandle<()>> {
        self.health_task.lock().take()
    }

    /// Sleep in one-second steps until shutdown is requested
    pub async fn wait_for_shutdown(&self) {
        while self.is_running() {
            let notified = self.shutdown_notify.notified();
            if !self.is_running() {
                break;
            }
            tokio::select! {
                _ = notified => {}
                _ = tokio::time::sleep(Duration::from_secs(1)) => {}
            }
        }
    }

    // ------------------------------------------------------------------
    // Twins
    // ------------------------------------------------------------------

    /// Query the platform for twins paired to this edge device.
    ///
    /// Failures are logged and yield an empty list. Only the first successful
    /// discovery is retained.
    pub async fn discover_twins(&self) -> Vec<Twin> {
        if self.config.edge_uuid.is_empty() {
            return Vec::new();
        }

        match self.transport.fetch_twins(&self.config.edge_uuid).await {
            Ok(twins) => {
                info!("Discovered {} twins", twins.len());
                if self.twins.set(twins.clone()).is_err() {
                    debug!("Twins already discovered, keeping the first result");
                }
                twins
            }
            Err(e) => {
                warn!("Failed to discover twins: {}", e);
                Vec::new()
            }
        }
    }

    pub fn discovered_twins(&self) -> &[Twin] {
        self.twins.get().map(Vec::as_slice).unwrap_or_default()
    }

    /// Twin identifiers in discovery order, falling back to the configured twin
    pub fn twin_ids(&self) -> Vec<String> {
        let ids: Vec<String> = self
            .discovered_twins()
            .iter()
            .filter(|t| !t.uuid.is_empty())
            .map(|t| t.uuid.clone())
            .collect();

        if ids.is_empty() {
            self.config.twin_uuid.iter().cloned().collect()
        } else {
            ids
        }
    }

    // ------------------------------------------------------------------
    // Publishing
    // ------------------------------------------------------------------

    pub async fn publish_position(
        &self,
        twin_uuid: &str,
        position: Vector3,
        rotation: Option<Quaternion>,
        source_type: Option<&str>,
    ) {
        let source = source_type.unwrap_or(&self.config.source_type);
        self.publish(
            self.topics.twin(twin_uuid, suffix::POSITION),
            &PositionMessage::new(position, source),
        )
        .await;

        if let Some(rotation) = rotation {
            self.publish(
                self.topics.twin(twin_uuid, suffix::ROTATION),
                &RotationMessage::new(rotation, source),
            )
            .await;
        }
    }

    pub async fn publish_joint_states(
        &self,
        twin_uuid: &str,
        joint_states: BTreeMap<String, f64>,
        source_type: Option<&str>,
    ) {
        let source = source_type.unwrap_or(&self.config.source_type);
        self.publish(
            self.topics.twin(twin_uuid, suffix::JOINT_STATES),
            &JointStatesMessage::new(joint_states, source),
        )
        .await;
    }

    pub async fn publish_nav_status(
        &self,
        twin_uuid: &str,
        action_id: &str,
        status: NavigationStatus,
        message: Option<&str>,
        progress: Option<f64>,
    ) {
        self.publish(
            self.topics.twin(twin_uuid, suffix::NAVIGATE_STATUS),
            &NavStatusMessage::new(action_id, status, message, progress),
        )
        .await;
    }

    pub async fn publish_health(&self, twin_uuid: &str, health: Map<String, Value>) {
        let payload = health_message(health, &self.config.edge_uuid, self.uptime());
        self.publish(self.topics.twin(twin_uuid, suffix::EDGE_HEALTH), &payload)
            .await;
    }

    pub async fn publish_event(&self, twin_uuid: &str, event_type: &str, data: Value) {
        self.publish(
            self.topics.twin(twin_uuid, suffix::EVENT),
            &EventMessage::new(event_type, data),
        )
        .await;
    }

    pub async fn publish_map_update(
        &self,
        twin_uuid: &str,
        pointcloud: Vec<Vec<f64>>,
        map_type: &str,
        resolution: f64,
    ) {
        self.publish(
            self.topics.twin(twin_uuid, suffix::MAP_UPDATE),
            &MapUpdateMessage::new(pointcloud, map_type, resolution),
        )
        .await;
    }

    pub async fn publish_telemetry(&self, twin_uuid: &str, telemetry_type: &str, data: Value) {
        self.publish(
            self.topics.twin(twin_uuid, suffix::TELEMETRY),
            &TelemetryMessage::new(telemetry_type, data, self.config.source_type.as_str()),
        )
        .await;
    }

    pub async fn publish_mission_status(
        &self,
        twin_uuid: &str,
        mission_execution_uuid: &str,
        status: &str,
        current_step: u32,
        message: Option<&str>,
        result: Option<Value>,
    ) {
        self.publish(
            self.topics.twin(twin_uuid, suffix::MISSION_STATUS),
            &MissionStatusMessage::new(mission_execution_uuid, status, current_step, message, result),
        )
        .await;
    }

    /// Best-effort publish: skipped when disconnected, failures only logged
    async fn publish<T: Serialize + ?Sized>(&self, topic: String, message: &T) {
        if !self.transport.is_connected() {
            return;
        }

        let payload = match serde_json::to_value(message) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to serialize message for {}: {}", topic, e);
                return;
            }
        };

        if let Err(e) = self.transport.publish(&topic, payload).await {
            warn!("Publish to {} failed: {}", topic, e);
        }
    }

    // ------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------

    pub async fn subscribe_navigate_command(
        &self,
        twin_uuid: &str,
        handler: MessageHandler,
    ) -> Result<(), TransportError> {
        self.subscribe(twin_uuid, suffix::NAVIGATE_COMMAND, handler).await
    }

    pub async fn subscribe_motion_command(
        &self,
        twin_uuid: &str,
        handler: MessageHandler,
    ) -> Result<(), TransportError> {
        self.subscribe(twin_uuid, suffix::MOTION_COMMAND, handler).await
    }

    pub async fn subscribe_mission_command(
        &self,
        twin_uuid: &str,
        handler: MessageHandler,
    ) -> Result<(), TransportError> {
        self.subscribe(twin_uuid, suffix::MISSION_COMMAND, handler).await
    }

    async fn subscribe(
        &self,
        twin_uuid: &str,
        topic_suffix: &str,
        handler: MessageHandler,
    ) -> Result<(), TransportError> {
        let topic = self.topics.twin(twin_uuid, topic_suffix);
        self.transport.subscribe(&topic, handler).await
    }
}
