//! Platform topic layout
//!
//! Every per-twin topic has the shape `{prefix}cyberwave/twin/{twin_uuid}/{suffix}`.

/// Fixed root segment under the configurable prefix
pub const TOPIC_ROOT: &str = "cyberwave";

/// Per-twin topic suffixes
pub mod suffix {
    pub const POSITION: &str = "position";
    pub const ROTATION: &str = "rotation";
    pub const JOINT_STATES: &str = "joint_states";
    pub const NAVIGATE_COMMAND: &str = "navigate/command";
    pub const NAVIGATE_STATUS: &str = "navigate/status";
    pub const MOTION_COMMAND: &str = "motion/command";
    pub const MISSION_COMMAND: &str = "mission/command";
    pub const MISSION_STATUS: &str = "mission/status";
    pub const EDGE_HEALTH: &str = "edge_health";
    pub const TELEMETRY: &str = "telemetry";
    pub const EVENT: &str = "event";
    pub const MAP_UPDATE: &str = "map_update";
}

/// Builds topics for a given namespace prefix
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicScheme {
    prefix: String,
}

impl TopicScheme {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    pub fn twin(&self, twin_uuid: &str, suffix: &str) -> String {
        format!("{}{}/twin/{}/{}", self.prefix, TOPIC_ROOT, twin_uuid, suffix)
    }
}
