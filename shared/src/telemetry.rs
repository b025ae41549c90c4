//! Telemetry model
//!
//! Passive value types produced by device adapters and tracked by the
//! supervisor. Everything here serializes to the JSON shapes used on the
//! platform topics.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Coarse operating state reported by the robot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RobotState {
    #[default]
    Idle,
    Navigating,
    Executing,
    Paused,
    Error,
    Charging,
    Teleop,
}

impl RobotState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RobotState::Idle => "idle",
            RobotState::Navigating => "navigating",
            RobotState::Executing => "executing",
            RobotState::Paused => "paused",
            RobotState::Error => "error",
            RobotState::Charging => "charging",
            RobotState::Teleop => "teleop",
        }
    }
}

impl fmt::Display for RobotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a navigation action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl NavigationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NavigationStatus::Queued => "queued",
            NavigationStatus::Running => "running",
            NavigationStatus::Completed => "completed",
            NavigationStatus::Failed => "failed",
            NavigationStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal statuses end an action's life in the tracking table
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            NavigationStatus::Completed | NavigationStatus::Failed | NavigationStatus::Cancelled
        )
    }
}

impl fmt::Display for NavigationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position in meters
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn distance_to(&self, other: &Vector3) -> f64 {
        ((other.x - self.x).powi(2) + (other.y - self.y).powi(2) + (other.z - self.z).powi(2))
            .sqrt()
    }
}

/// Orientation quaternion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}

impl Quaternion {
    pub fn identity() -> Self {
        Self { w: 1.0, x: 0.0, y: 0.0, z: 0.0 }
    }

    /// Rotation about the vertical axis
    pub fn from_yaw(yaw: f64) -> Self {
        let half = yaw / 2.0;
        Self { w: half.cos(), x: 0.0, y: 0.0, z: half.sin() }
    }
}

/// Linear and angular velocity
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    pub linear: Vector3,
    pub angular: Vector3,
}

/// Latest robot telemetry as reported by an adapter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub position: Option<Vector3>,
    pub rotation: Option<Quaternion>,
    pub velocity: Option<Velocity>,
    /// Battery level in percent, if the robot reports one
    pub battery_level: Option<f64>,
    #[serde(default)]
    pub battery_charging: bool,
    #[serde(default)]
    pub state: RobotState,
    #[serde(default)]
    pub errors: Vec<Value>,
    pub current_action_id: Option<String>,
    pub action_progress: Option<f64>,
    #[serde(default)]
    pub vendor_data: Map<String, Value>,
}

/// Bookkeeping entry for an accepted navigation action
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRecord {
    pub action_id: String,
    pub twin_uuid: String,
    pub command: String,
    pub status: NavigationStatus,
    /// Original inbound command payload
    pub request: Value,
    pub mission_execution_uuid: Option<String>,
}

impl ActionRecord {
    /// A freshly accepted action
    pub fn queued(
        action_id: impl Into<String>,
        twin_uuid: impl Into<String>,
        command: impl Into<String>,
        request: Value,
    ) -> Self {
        Self {
            action_id: action_id.into(),
            twin_uuid: twin_uuid.into(),
            command: command.into(),
            status: NavigationStatus::Queued,
            request,
            mission_execution_uuid: None,
        }
    }

    pub fn with_mission(mut self, mission_execution_uuid: Option<String>) -> Self {
        self.mission_execution_uuid = mission_execution_uuid;
        self
    }
}
