//! AMR device supervisor
//!
//! Owns one device adapter for the life of the process, republishes its
//! telemetry, tracks navigation actions and keeps the adapter connected.

use async_trait::async_trait;
use edge_shared::state_machine::ReconnectState;
use edge_shared::{DeviceAdapter, StatusUpdate, TelemetrySnapshot};
use serde_json::{json, Map, Value};
use std::sync::{Arc, OnceLock};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::command;
use crate::config::{AdapterConfig, EdgeConfig};
use crate::device::actions::ActionTracker;
use crate::device::map::MapProvider;
use crate::device::reconnect::Reconnector;
use crate::error::{ConfigError, EdgeError};
use crate::node::{self, cancel_task, EdgeNode, NodeCore};
use crate::transport::PlatformTransport;

/// Builds the adapter for a given configuration; `None` runs without one
pub type AdapterFactory =
    Box<dyn Fn(&AdapterConfig) -> Option<Arc<dyn DeviceAdapter>> + Send + Sync>;

#[derive(Default)]
struct BackgroundTasks {
    position: Option<JoinHandle<()>>,
    telemetry: Option<JoinHandle<()>>,
    status_pump: Option<JoinHandle<()>>,
}

pub struct DeviceSupervisor {
    pub(crate) core: NodeCore,
    pub(crate) adapter_config: AdapterConfig,
    factory: AdapterFactory,
    adapter: OnceLock<Arc<dyn DeviceAdapter>>,
    pub(crate) actions: ActionTracker,
    pub(crate) latest: RwLock<Option<TelemetrySnapshot>>,
    pub(crate) reconnect: Reconnector,
    tasks: Mutex<BackgroundTasks>,
    pub(crate) map_provider: Option<Arc<dyn MapProvider>>,
}

impl DeviceSupervisor {
    pub fn new(
        config: EdgeConfig,
        adapter_config: AdapterConfig,
        transport: Arc<dyn PlatformTransport>,
        factory: AdapterFactory,
    ) -> Self {
        Self {
            core: NodeCore::new(config, transport),
            adapter_config,
            factory,
            adapter: OnceLock::new(),
            actions: ActionTracker::new(),
            latest: RwLock::new(None),
            reconnect: Reconnector::default(),
            tasks: Mutex::new(BackgroundTasks::default()),
            map_provider: None,
        }
    }

    /// Install a vendor map exporter used by [`DeviceSupervisor::sync_map`]
    pub fn with_map_provider(mut self, provider: Arc<dyn MapProvider>) -> Self {
        self.map_provider = Some(provider);
        self
    }

    /// Run until shutdown; see [`node::run`]
    pub async fn run(self: Arc<Self>) -> Result<(), EdgeError> {
        node::run(self).await
    }

    pub async fn shutdown(&self) {
        node::shutdown(self).await;
    }

    pub fn core(&self) -> &NodeCore {
        &self.core
    }

    pub fn adapter(&self) -> Option<&Arc<dyn DeviceAdapter>> {
        self.adapter.get()
    }

    pub fn adapter_config(&self) -> &AdapterConfig {
        &self.adapter_config
    }

    pub fn actions(&self) -> &ActionTracker {
        &self.actions
    }

    pub async fn latest_telemetry(&self) -> Option<TelemetrySnapshot> {
        self.latest.read().await.clone()
    }

    pub async fn reconnect_state(&self) -> ReconnectState {
        self.reconnect.state().await
    }

    pub async fn reconnect_attempts(&self) -> u32 {
        self.reconnect.attempts().await
    }

    /// Route adapter status callbacks through an ordered channel to a pump task
    async fn start_status_pump(self: &Arc<Self>, adapter: &Arc<dyn DeviceAdapter>) {
        let (tx, rx) = mpsc::unbounded_channel::<StatusUpdate>();
        adapter.set_status_callback(Arc::new(move |update| {
            let _ = tx.send(update);
        }));

        let handle = tokio::spawn(command::run_status_pump(self.clone(), rx));
        self.tasks.lock().await.status_pump = Some(handle);
    }
}

#[async_trait]
impl EdgeNode for DeviceSupervisor {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.core.config().validate()?;
        self.adapter_config.validate()
    }

    async fn setup(self: Arc<Self>) -> Result<(), EdgeError> {
        self.core.discover_twins().await;

        let Some(adapter) = (self.factory)(&self.adapter_config) else {
            warn!("No adapter configured, telemetry and commands are disabled");
            return Ok(());
        };
        if self.adapter.set(adapter.clone()).is_err() {
            warn!("Adapter already initialised, ignoring repeated setup");
            return Ok(());
        }
        info!(
            "Using adapter {} (type {:?})",
            adapter.name(),
            self.adapter_config.adapter_type
        );

        self.start_status_pump(&adapter).await;
        self.connect_adapter().await;

        let mut tasks = self.tasks.lock().await;
        tasks.position = Some(tokio::spawn(self.clone().position_stream_loop()));
        tasks.telemetry = Some(tokio::spawn(self.clone().telemetry_poll_loop()));
        info!(
            "Streaming position at {} Hz, telemetry at {} Hz",
            self.adapter_config.position_poll_rate_hz, self.adapter_config.telemetry_poll_rate_hz
        );
        Ok(())
    }

    async fn subscribe_to_commands(self: Arc<Self>) -> Result<(), EdgeError> {
        command::subscribe_commands(self).await
    }

    async fn cleanup(&self) {
        let (position, telemetry, status_pump) = {
            let mut tasks = self.tasks.lock().await;
            (
                tasks.position.take(),
                tasks.telemetry.take(),
                tasks.status_pump.take(),
            )
        };

        if let Some(handle) = position {
            cancel_task(handle, "position").await;
        }
        if let Some(handle) = telemetry {
            cancel_task(handle, "telemetry").await;
        }
        self.reconnect.close();
        if let Some(handle) = self.reconnect.take_pending().await {
            cancel_task(handle, "reconnect").await;
        }
        if let Some(handle) = status_pump {
            cancel_task(handle, "status").await;
        }

        if let Some(adapter) = self.adapter() {
            if let Err(e) = adapter.disconnect().await {
                warn!("Adapter disconnect failed: {}", e);
            }
        }
    }

    async fn build_health_status(&self) -> Map<String, Value> {
        let snapshot = self.latest.read().await.clone();
        let adapter_connected = self.adapter().map(|a| a.is_connected()).unwrap_or(false);

        let health = json!({
            "adapter_type": self.adapter_config.adapter_type,
            "adapter_connected": adapter_connected,
            "robot_id": self.adapter_config.robot_id,
            "robot_state": snapshot.as_ref().map(|s| s.state.as_str()).unwrap_or("unknown"),
            "battery_level": snapshot.as_ref().and_then(|s| s.battery_level),
            "battery_charging": snapshot.as_ref().map(|s| s.battery_charging).unwrap_or(false),
            "active_actions": self.actions.len().await,
            "errors": snapshot.as_ref().map(|s| s.errors.clone()).unwrap_or_default(),
            "position_rate_hz": self.adapter_config.position_poll_rate_hz,
        });

        match health {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}
