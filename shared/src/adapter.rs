//! Device adapter contract
//!
//! Every vendor driver implements [`DeviceAdapter`]. The supervisor talks to
//! the robot only through this trait and learns about command progress only
//! through the registered [`StatusCallback`].

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use crate::telemetry::{NavigationStatus, Quaternion, TelemetrySnapshot, Vector3};

/// Errors raised by device adapters
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("Adapter not connected")]
    NotConnected,

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Telemetry poll failed: {0}")]
    Poll(String),

    #[error("Command failed: {0}")]
    Command(String),

    #[error("Operation not supported: {0}")]
    Unsupported(&'static str),
}

/// Asynchronous progress report for a navigation action
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub action_id: String,
    pub status: NavigationStatus,
    pub message: Option<String>,
    pub progress: Option<f64>,
}

impl StatusUpdate {
    pub fn new(action_id: impl Into<String>, status: NavigationStatus) -> Self {
        Self {
            action_id: action_id.into(),
            status,
            message: None,
            progress: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_progress(mut self, progress: f64) -> Self {
        self.progress = Some(progress);
        self
    }
}

/// Callback registered by the supervisor to receive status updates.
///
/// Adapters may invoke it from any task; it must not block.
pub type StatusCallback = Arc<dyn Fn(StatusUpdate) + Send + Sync>;

/// Navigation target handed to [`DeviceAdapter::send_navigation_command`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NavigationRequest {
    pub action_id: String,
    /// Command kind as received (`goto`, `path`, ...)
    pub command: String,
    pub position: Option<Vector3>,
    pub rotation: Option<Quaternion>,
    pub waypoints: Option<Vec<Value>>,
    pub yaw: Option<f64>,
    pub constraints: Option<Value>,
    pub metadata: Option<Value>,
}

/// Capability interface for a robot driver
#[async_trait]
pub trait DeviceAdapter: Send + Sync {
    /// Open the connection to the robot
    async fn connect(&self) -> Result<(), AdapterError>;

    /// Close the connection to the robot
    async fn disconnect(&self) -> Result<(), AdapterError>;

    /// Whether the robot is currently reachable
    fn is_connected(&self) -> bool;

    /// Fetch the current telemetry, `None` if the robot has nothing to report
    async fn poll_telemetry(&self) -> Result<Option<TelemetrySnapshot>, AdapterError>;

    /// Submit a navigation goal; `Ok(false)` means the robot refused it
    async fn send_navigation_command(&self, request: NavigationRequest)
        -> Result<bool, AdapterError>;

    async fn cancel_navigation(&self, action_id: &str) -> Result<bool, AdapterError>;

    async fn pause_navigation(&self) -> Result<bool, AdapterError>;

    async fn resume_navigation(&self) -> Result<bool, AdapterError>;

    /// Register the single receiver of status updates, replacing any previous one
    fn set_status_callback(&self, callback: StatusCallback);

    /// Short identifier used in logs
    fn name(&self) -> &str {
        "adapter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_update_builder() {
        let update = StatusUpdate::new("a-1", NavigationStatus::Running)
            .with_message("halfway")
            .with_progress(50.0);

        assert_eq!(update.action_id, "a-1");
        assert_eq!(update.status, NavigationStatus::Running);
        assert_eq!(update.message.as_deref(), Some("halfway"));
        assert_eq!(update.progress, Some(50.0));
    }

    #[test]
    fn test_callback_is_shareable() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: StatusCallback = Arc::new(move |update| {
            sink.lock().unwrap().push(update.action_id);
        });

        let cloned = callback.clone();
        callback(StatusUpdate::new("a", NavigationStatus::Queued));
        cloned(StatusUpdate::new("b", NavigationStatus::Completed));

        assert_eq!(*seen.lock().unwrap(), vec!["a".to_string(), "b".to_string()]);
    }
}
