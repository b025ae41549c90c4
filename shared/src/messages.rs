//! Platform message payloads
//!
//! Outbound messages are plain serde structs stamped with a wall-clock
//! `timestamp` (seconds). Inbound commands are parsed leniently: every field
//! is optional and unknown fields are ignored.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::adapter::NavigationRequest;
use crate::telemetry::{NavigationStatus, Quaternion, Vector3};
use crate::{now_secs, EVENT_SOURCE};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionMessage {
    pub position: Vector3,
    pub source_type: String,
    pub timestamp: f64,
}

impl PositionMessage {
    pub fn new(position: Vector3, source_type: impl Into<String>) -> Self {
        Self { position, source_type: source_type.into(), timestamp: now_secs() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RotationMessage {
    pub rotation: Quaternion,
    pub source_type: String,
    pub timestamp: f64,
}

impl RotationMessage {
    pub fn new(rotation: Quaternion, source_type: impl Into<String>) -> Self {
        Self { rotation, source_type: source_type.into(), timestamp: now_secs() }
    }
}

/// Joint positions in radians keyed by joint name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JointStatesMessage {
    pub joint_states: BTreeMap<String, f64>,
    pub source_type: String,
    pub timestamp: f64,
}

impl JointStatesMessage {
    pub fn new(joint_states: BTreeMap<String, f64>, source_type: impl Into<String>) -> Self {
        Self { joint_states, source_type: source_type.into(), timestamp: now_secs() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavStatusMessage {
    pub action_id: String,
    pub status: NavigationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    pub timestamp: f64,
}

impl NavStatusMessage {
    pub fn new(
        action_id: impl Into<String>,
        status: NavigationStatus,
        message: Option<&str>,
        progress: Option<f64>,
    ) -> Self {
        Self {
            action_id: action_id.into(),
            status,
            // Empty messages are dropped from the payload
            message: message.filter(|m| !m.is_empty()).map(str::to_string),
            progress,
            timestamp: now_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissionStatusMessage {
    pub mission_execution_uuid: String,
    pub status: String,
    pub current_step: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    pub timestamp: f64,
}

impl MissionStatusMessage {
    pub fn new(
        mission_execution_uuid: impl Into<String>,
        status: impl Into<String>,
        current_step: u32,
        message: Option<&str>,
        result: Option<Value>,
    ) -> Self {
        Self {
            mission_execution_uuid: mission_execution_uuid.into(),
            status: status.into(),
            current_step,
            message: message.filter(|m| !m.is_empty()).map(str::to_string),
            result: result.filter(|r| !is_empty_value(r)),
            timestamp: now_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryMessage {
    pub telemetry_type: String,
    pub data: Value,
    pub source_type: String,
    pub timestamp: f64,
}

impl TelemetryMessage {
    pub fn new(telemetry_type: impl Into<String>, data: Value, source_type: impl Into<String>) -> Self {
        Self {
            telemetry_type: telemetry_type.into(),
            data,
            source_type: source_type.into(),
            timestamp: now_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventMessage {
    pub event_type: String,
    pub source: String,
    pub data: Value,
    pub timestamp: f64,
}

impl EventMessage {
    pub fn new(event_type: impl Into<String>, data: Value) -> Self {
        Self {
            event_type: event_type.into(),
            source: EVENT_SOURCE.to_string(),
            data,
            timestamp: now_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapUpdateMessage {
    pub pointcloud: Vec<Vec<f64>>,
    pub map_type: String,
    pub resolution: f64,
    pub timestamp: f64,
}

impl MapUpdateMessage {
    pub const DEFAULT_MAP_TYPE: &'static str = "point_cloud";
    pub const DEFAULT_RESOLUTION: f64 = 0.05;

    pub fn new(pointcloud: Vec<Vec<f64>>, map_type: impl Into<String>, resolution: f64) -> Self {
        Self {
            pointcloud,
            map_type: map_type.into(),
            resolution,
            timestamp: now_secs(),
        }
    }
}

/// Merge a health document with the node identity.
///
/// Identity fields win over same-named fields in `health`.
pub fn health_message(mut health: Map<String, Value>, edge_uuid: &str, uptime: f64) -> Value {
    health.insert("edge_uuid".into(), Value::String(edge_uuid.to_string()));
    health.insert("timestamp".into(), Value::from(now_secs()));
    health.insert("uptime".into(), Value::from(uptime));
    Value::Object(health)
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Number(_) => false,
    }
}

/// Kind of a navigation command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavCommandKind {
    Goto,
    Path,
    Stop,
    Pause,
    Resume,
    Other(String),
}

impl NavCommandKind {
    pub fn as_str(&self) -> &str {
        match self {
            NavCommandKind::Goto => "goto",
            NavCommandKind::Path => "path",
            NavCommandKind::Stop => "stop",
            NavCommandKind::Pause => "pause",
            NavCommandKind::Resume => "resume",
            NavCommandKind::Other(kind) => kind,
        }
    }

    /// Stop, pause and resume act on the current motion rather than starting one
    pub fn is_control(&self) -> bool {
        matches!(self, NavCommandKind::Stop | NavCommandKind::Pause | NavCommandKind::Resume)
    }
}

impl From<&str> for NavCommandKind {
    fn from(value: &str) -> Self {
        match value {
            "goto" => NavCommandKind::Goto,
            "path" => NavCommandKind::Path,
            "stop" => NavCommandKind::Stop,
            "pause" => NavCommandKind::Pause,
            "resume" => NavCommandKind::Resume,
            other => NavCommandKind::Other(other.to_string()),
        }
    }
}

impl fmt::Display for NavCommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inbound `navigate/command` payload
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NavigateCommand {
    #[serde(default)]
    pub action_id: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub position: Option<Vector3>,
    #[serde(default)]
    pub rotation: Option<Quaternion>,
    #[serde(default)]
    pub waypoints: Option<Vec<Value>>,
    #[serde(default)]
    pub yaw: Option<f64>,
    #[serde(default)]
    pub constraints: Option<Value>,
    #[serde(default)]
    pub metadata: Option<Value>,
    #[serde(default)]
    pub mission_execution_uuid: Option<String>,
}

impl NavigateCommand {
    /// Command kind, `goto` when absent
    pub fn kind(&self) -> NavCommandKind {
        self.command.as_deref().map(NavCommandKind::from).unwrap_or(NavCommandKind::Goto)
    }

    /// Caller-supplied action id, ignoring empty strings
    pub fn action_id(&self) -> Option<&str> {
        self.action_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Owning mission, taken from the top level or from `metadata`
    pub fn mission_execution_uuid(&self) -> Option<String> {
        self.mission_execution_uuid
            .clone()
            .or_else(|| {
                self.metadata
                    .as_ref()
                    .and_then(|m| m.get("mission_execution_uuid"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .filter(|uuid| !uuid.is_empty())
    }

    pub fn to_request(&self, action_id: impl Into<String>) -> NavigationRequest {
        NavigationRequest {
            action_id: action_id.into(),
            command: self.kind().as_str().to_string(),
            position: self.position,
            rotation: self.rotation,
            waypoints: self.waypoints.clone(),
            yaw: self.yaw,
            constraints: self.constraints.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

/// Kind of a mission command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissionCommandKind {
    Start,
    Cancel,
    Pause,
    Resume,
    Other(String),
}

impl From<&str> for MissionCommandKind {
    fn from(value: &str) -> Self {
        match value {
            "start" => MissionCommandKind::Start,
            "cancel" => MissionCommandKind::Cancel,
            "pause" => MissionCommandKind::Pause,
            "resume" => MissionCommandKind::Resume,
            other => MissionCommandKind::Other(other.to_string()),
        }
    }
}

/// Inbound `mission/command` payload
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MissionCommand {
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub mission_execution_uuid: Option<String>,
}

impl MissionCommand {
    pub fn kind(&self) -> MissionCommandKind {
        MissionCommandKind::from(self.command.as_deref().unwrap_or_default())
    }
}
